//! Set and remove commands - one-shot writes against a server.

use std::sync::Arc;

use treesync::events::EventBus;

use super::watch::connect;
use crate::cli::{RemoveArgs, SetArgs};

/// Set a value, or send a delta with `--delta`
pub async fn set(args: &SetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(&args.connect, Arc::new(EventBus::new())).await?;
    // Load the current document first so the push carries it back unchanged.
    client.poll_once().await?;

    if args.delta {
        let delta = args
            .value
            .as_deref()
            .ok_or("--delta needs a value to add")?;
        client.change(&args.path, delta).await?;
        println!("{} += {delta}", args.path);
    } else {
        client.set(&args.path, args.value.as_deref()).await?;
        match &args.value {
            Some(value) => println!("{} = {value}", args.path),
            None => println!("{} created", args.path),
        }
    }
    Ok(())
}

/// Remove a node
pub async fn remove(args: &RemoveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(&args.connect, Arc::new(EventBus::new())).await?;
    client.poll_once().await?;

    if client.remove(&args.path).await? {
        println!("{} removed", args.path);
    } else {
        println!("{} not found locally, removal sent", args.path);
    }
    Ok(())
}
