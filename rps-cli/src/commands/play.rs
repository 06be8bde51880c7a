use super::console::ConsoleInteract;
use super::short;
use crate::config::CliConfig;
use anyhow::{bail, Context};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::{Input, Select};
use rps_core::{Amount, Storage};
use rps_game::{Hand, HandCode, Role, ScriptedInteract, Step, Terms};

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Wager each party puts at stake
    #[arg(short, long)]
    wager: Option<u64>,
    /// Extra deposit from Alice, refunded unless she forfeits
    #[arg(short, long)]
    escrow: Option<u64>,
    /// Alice's hand (rock, paper, scissors, or a raw code)
    #[arg(long)]
    alice: Option<String>,
    /// Bob's hand (rock, paper, scissors, or a raw code)
    #[arg(long)]
    bob: Option<String>,
    /// Make a role stay silent at one step, e.g. bob:show
    #[arg(long, value_parser = parse_abstain)]
    abstain: Option<(Role, Step)>,
    /// Deadline window in ledger ticks
    #[arg(long)]
    window: Option<u64>,
    /// Milliseconds per ledger tick
    #[arg(long)]
    tick_ms: Option<u64>,
}

pub async fn play(storage: &Storage, mut config: CliConfig, args: PlayArgs) -> anyhow::Result<()> {
    if let Some(window) = args.window {
        config.window = window;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }

    let wager = match args.wager {
        Some(wager) => wager,
        None => prompt_amount("Wager", 10)?,
    };
    let escrow = match args.escrow {
        Some(escrow) => escrow,
        None => prompt_amount("Escrow", 1)?,
    };
    let alice_hand = match args.alice {
        Some(hand) => parse_hand_code(&hand)?,
        None => prompt_hand(Role::Alice)?,
    };
    let bob_hand = match args.bob {
        Some(hand) => parse_hand_code(&hand)?,
        None => prompt_hand(Role::Bob)?,
    };

    let terms = Terms::new(Amount::from_units(wager), Amount::from_units(escrow));
    let mut alice = ScriptedInteract::new().with_terms(terms).with_hand(alice_hand);
    let mut bob = ScriptedInteract::new().with_hand(bob_hand);
    match args.abstain {
        Some((Role::Alice, step)) => alice = alice.abstaining_at(step),
        Some((Role::Bob, Step::Accept)) => bob = bob.declining(),
        Some((Role::Bob, step)) => bob = bob.abstaining_at(step),
        _ => {}
    }

    let mut game = rps_game::create_game(config.protocol(), terms)?;
    game.start_clock();

    println!("Game {}", game.id());
    println!(
        "Alice {} deposits {}, Bob {} deposits {}",
        short(game.alice().as_str()),
        terms
            .alice_deposit()
            .context("stakes overflow")?,
        short(game.bob().as_str()),
        terms.bob_deposit()
    );
    println!();

    let played = game
        .play(
            ConsoleInteract::new(Role::Alice, alice),
            ConsoleInteract::new(Role::Bob, bob),
            ConsoleInteract::observer(),
        )
        .await?;
    let report = played.report;

    println!();
    println!("Result: {}", report.result);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Role", "Party", "Hand", "Balance"]);
    table.add_row(vec![
        "Alice".to_string(),
        short(game.alice().as_str()),
        hand_cell(report.session.alice_hand()),
        report.alice_balance.to_string(),
    ]);
    table.add_row(vec![
        "Bob".to_string(),
        short(game.bob().as_str()),
        hand_cell(report.session.bob_hand()),
        report.bob_balance.to_string(),
    ]);
    println!("{}", table);

    let record = game.save(storage).await?;
    println!("Saved session {} ({} events)", record.id, report.events.len());

    Ok(())
}

fn hand_cell(hand: Option<HandCode>) -> String {
    hand.map(|hand| hand.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn prompt_amount(prompt: &str, default: u64) -> rps_core::Result<u64> {
    let amount = Input::<u64>::new()
        .with_prompt(prompt)
        .default(default)
        .interact_text()?;
    Ok(amount)
}

fn prompt_hand(role: Role) -> rps_core::Result<HandCode> {
    let selection = Select::new()
        .with_prompt(format!("{}'s hand", role))
        .items(&Hand::ALL)
        .default(0)
        .interact()?;
    Ok(Hand::ALL[selection].code())
}

/// Accepts a hand name or any raw code, so malformed hands can be played.
fn parse_hand_code(input: &str) -> anyhow::Result<HandCode> {
    if let Ok(hand) = input.parse::<Hand>() {
        return Ok(hand.code());
    }
    match input.parse::<u64>() {
        Ok(code) => Ok(HandCode(code)),
        Err(_) => bail!("unknown hand '{}'", input),
    }
}

fn parse_abstain(input: &str) -> Result<(Role, Step), String> {
    let (role, step) = input
        .split_once(':')
        .ok_or_else(|| format!("expected ROLE:STEP, got '{}'", input))?;

    let role = match role.to_ascii_lowercase().as_str() {
        "alice" => Role::Alice,
        "bob" => Role::Bob,
        other => return Err(format!("unknown role '{}'", other)),
    };
    let step = match step.to_ascii_lowercase().as_str() {
        "accept" => Step::Accept,
        "commit" => Step::Commit,
        "show" => Step::Show,
        "reveal" => Step::Reveal,
        other => return Err(format!("unknown step '{}'", other)),
    };

    let advances = match step {
        Step::Accept | Step::Show => Role::Bob,
        _ => Role::Alice,
    };
    if role != advances {
        return Err(format!("{} does not submit at {:?}", role, step));
    }

    Ok((role, step))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_abstain() {
        assert_eq!(parse_abstain("bob:show"), Ok((Role::Bob, Step::Show)));
        assert_eq!(parse_abstain("Alice:Reveal"), Ok((Role::Alice, Step::Reveal)));
        assert!(parse_abstain("alice:show").is_err());
        assert!(parse_abstain("bob").is_err());
        assert!(parse_abstain("carol:accept").is_err());
    }

    #[test]
    fn test_parse_hand_code() {
        assert_eq!(parse_hand_code("paper").unwrap(), Hand::Paper.code());
        assert_eq!(parse_hand_code("5").unwrap(), HandCode(5));
        assert!(parse_hand_code("lizard").is_err());
    }
}
