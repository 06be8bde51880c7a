use super::console::ConsoleInteract;
use super::short;
use comfy_table::{presets::UTF8_FULL, Table};
use rps_core::{FinalizedEvent, SessionStore, Storage};
use rps_game::{Game, GameMetadata, Role, Step, Transition};
use uuid::Uuid;

pub async fn list_sessions(storage: &Storage) -> anyhow::Result<()> {
    let sessions = SessionStore::new(storage).list_sessions().await?;

    if sessions.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Session ID", "Created", "Wager", "Escrow", "Result"]);

    for session in &sessions {
        let terms = serde_json::from_value::<GameMetadata>(session.metadata.clone())
            .ok()
            .and_then(|metadata| metadata.terms);
        table.add_row(vec![
            session.id.clone(),
            session.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            terms.map(|t| t.wager.to_string()).unwrap_or_else(|| "-".to_string()),
            terms.map(|t| t.escrow.to_string()).unwrap_or_else(|| "-".to_string()),
            session.result.clone().unwrap_or_else(|| "unfinished".to_string()),
        ]);
    }

    println!("Stored Sessions:");
    println!("{}", table);

    Ok(())
}

pub async fn show_session(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let store = SessionStore::new(storage);
    let record = store.load_session(id).await?;
    let events: Vec<FinalizedEvent<Transition>> = store.load_events(id).await?;

    println!("Session: {}", record.id);
    println!(
        "Created: {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Result: {}",
        record.result.as_deref().unwrap_or("unfinished")
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Slot", "Tick", "Step", "From", "Paid", "Action", "Payouts", "Escrow",
    ]);

    for event in &events {
        let step = Step::from_tag(event.tag)
            .map(|step| format!("{:?}", step))
            .unwrap_or_else(|| format!("tag {}", event.tag));
        let payouts = event
            .transfers
            .iter()
            .map(|t| format!("{} -> {}", t.amount, short(t.to.as_str())))
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            event.index.to_string(),
            event.tick.to_string(),
            step,
            short(event.from.as_str()),
            event.value.to_string(),
            event.payload.to_string(),
            payouts,
            event.escrow.to_string(),
        ]);
    }

    println!("{}", table);

    Ok(())
}

pub async fn replay_session(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let replayed = Game::replay(storage, id).await?;
    println!(
        "Replaying {} events of session {}",
        replayed.events.len(),
        replayed.record.id
    );

    let Some(stored) = replayed.session.result() else {
        println!("Session unfinished, {}", replayed.session.phase());
        return Ok(());
    };

    let game = Game::from_log(Uuid::parse_str(id)?, replayed.metadata, replayed.events)?;
    let mut observer = game.driver(Role::Observer, ConsoleInteract::observer());
    let result = observer.run().await?;

    if result != stored {
        anyhow::bail!("replay ended in {} but the log records {}", result, stored);
    }
    println!("Replay reproduces: {}", result);

    Ok(())
}
