use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bracket::{
    countdown, round_label, LaneAssignment, LaneSettings, MatchRef, Mutation, RosterIndex,
};
use callroom_core::{
    config::{load_settings, prepare_database_url},
    new_event_id, CallroomClient,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use shared::domain::{display_fencer, EventId, Fencer, FencerId, Mode, Slot};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the database url from callroom.toml and the environment.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    NewEvent,
    Events,
    Generate {
        event: String,
        /// JSON array of {id, given_name, family_name, nation}, in seed order.
        roster: PathBuf,
        #[arg(long)]
        mode: Option<Mode>,
        #[arg(long)]
        participants: Option<usize>,
    },
    Show {
        event: String,
    },
    Select {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
        slot: u8,
    },
    Clear {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
    },
    PlacementSelect {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
        slot: u8,
    },
    PlacementClear {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
    },
    Lane {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
        /// Lane number starting at 1; omit to restore the automatic lane.
        lane: Option<usize>,
        #[arg(long)]
        placement: bool,
    },
    Lanes {
        event: String,
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        colors: Vec<String>,
    },
    Attend {
        event: String,
        #[arg(value_name = "MATCH")]
        index: usize,
        slot: u8,
    },
    Swap {
        event: String,
        round: usize,
        #[arg(value_name = "MATCH")]
        index: usize,
    },
    Round {
        event: String,
        round: usize,
    },
    Next {
        event: String,
    },
    Prev {
        event: String,
    },
    ConfirmSides {
        event: String,
    },
    Arranged {
        event: String,
    },
    Schedule {
        event: String,
        round: usize,
        group: usize,
        /// "HH:MM"; empty removes the entry.
        time: String,
    },
    Groups {
        event: String,
    },
    Reset {
        event: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    settings.database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))?;

    if let Command::NewEvent = cli.command {
        println!("{}", new_event_id());
        return Ok(());
    }
    if let Command::Events = cli.command {
        for event in storage.list_events().await? {
            let kinds: Vec<&str> = event.documents.iter().map(|kind| kind.as_str()).collect();
            println!(
                "{}  updated {}  [{}]",
                event.event_id,
                event.updated_at.to_rfc3339(),
                kinds.join(", ")
            );
        }
        return Ok(());
    }

    let default_mode = settings.default_mode;
    let client = CallroomClient::new(Arc::new(storage), settings)?;

    match cli.command {
        Command::NewEvent | Command::Events => {}
        Command::Generate {
            event,
            roster,
            mode,
            participants,
        } => {
            let event_id = open(&client, &event).await;
            let records: Vec<Fencer> = serde_json::from_str(
                &fs::read_to_string(&roster)
                    .with_context(|| format!("failed to read {}", roster.display()))?,
            )
            .with_context(|| format!("failed to parse roster {}", roster.display()))?;
            let seeded: Vec<FencerId> = records.iter().map(|fencer| fencer.id.clone()).collect();
            let index = RosterIndex::from_records(records);
            let mode = mode.unwrap_or(default_mode);
            let participants = participants.unwrap_or_else(|| mode.participant_count());
            let seated = client
                .create_bracket(&event_id, mode, participants, &index, &seeded)
                .await?;
            info!(%event_id, seated, "bracket generated");
            println!("seated {seated} of {} entrants", index.len());
        }
        Command::Show { event } => {
            let event_id = open(&client, &event).await;
            show(&client, &event_id).await?;
        }
        Command::Select {
            event,
            round,
            index,
            slot,
        } => {
            let event_id = open(&client, &event).await;
            let mutation = client
                .select_winner(&event_id, round, index, parse_slot(slot)?)
                .await?;
            report(mutation);
        }
        Command::Clear {
            event,
            round,
            index,
        } => {
            let event_id = open(&client, &event).await;
            report(client.clear_winner(&event_id, round, index).await?);
        }
        Command::PlacementSelect {
            event,
            round,
            index,
            slot,
        } => {
            let event_id = open(&client, &event).await;
            let mutation = client
                .select_consolation_winner(&event_id, round, index, parse_slot(slot)?)
                .await?;
            report(mutation);
        }
        Command::PlacementClear {
            event,
            round,
            index,
        } => {
            let event_id = open(&client, &event).await;
            report(
                client
                    .clear_consolation_winner(&event_id, round, index)
                    .await?,
            );
        }
        Command::Lane {
            event,
            round,
            index,
            lane,
            placement,
        } => {
            let event_id = open(&client, &event).await;
            let target = if placement {
                MatchRef::Consolation { round, index }
            } else {
                MatchRef::Main { round, index }
            };
            let assignment = match lane {
                Some(0) => anyhow::bail!("lane numbers start at 1"),
                Some(lane) => LaneAssignment::Manual { lane: lane - 1 },
                None => LaneAssignment::Automatic,
            };
            report(client.set_lane_override(&event_id, target, assignment).await?);
        }
        Command::Lanes {
            event,
            names,
            colors,
        } => {
            let event_id = open(&client, &event).await;
            let current = client.lanes(&event_id).await.to_settings();
            let settings = LaneSettings {
                names: if names.is_empty() { current.names } else { names },
                colors: if colors.is_empty() { current.colors } else { colors },
            };
            report(client.set_lane_settings(&event_id, &settings).await?);
        }
        Command::Attend { event, index, slot } => {
            let event_id = open(&client, &event).await;
            match client
                .toggle_attendance(&event_id, index, parse_slot(slot)?)
                .await?
            {
                Some(status) => println!("{}", status.as_str()),
                None => println!("no bracket for event {event_id}"),
            }
        }
        Command::Swap {
            event,
            round,
            index,
        } => {
            let event_id = open(&client, &event).await;
            report(client.swap_sides(&event_id, round, index).await?);
        }
        Command::Round { event, round } => {
            let event_id = open(&client, &event).await;
            report(client.set_callroom_round(&event_id, round).await);
        }
        Command::Next { event } => {
            let event_id = open(&client, &event).await;
            report(client.next_group(&event_id).await);
        }
        Command::Prev { event } => {
            let event_id = open(&client, &event).await;
            report(client.prev_group(&event_id).await);
        }
        Command::ConfirmSides { event } => {
            let event_id = open(&client, &event).await;
            report(client.toggle_sides_confirmed(&event_id).await);
        }
        Command::Arranged { event } => {
            let event_id = open(&client, &event).await;
            report(client.toggle_fully_arranged(&event_id).await);
        }
        Command::Schedule {
            event,
            round,
            group,
            time,
        } => {
            let event_id = open(&client, &event).await;
            report(client.set_schedule_time(&event_id, round, group, &time).await);
        }
        Command::Groups { event } => {
            let event_id = open(&client, &event).await;
            groups(&client, &event_id).await;
        }
        Command::Reset { event } => {
            let event_id = EventId::new(event);
            client.open_event(&event_id).await;
            client.reset_event(&event_id).await;
            println!("event {event_id} reset");
        }
    }

    Ok(())
}

async fn open(client: &CallroomClient, event: &str) -> EventId {
    let event_id = EventId::new(event);
    client.open_event(&event_id).await;
    event_id
}

fn parse_slot(slot: u8) -> Result<Slot> {
    Slot::from_number(slot).context("slot must be 1 or 2")
}

fn report(mutation: Mutation) {
    match mutation {
        Mutation::Applied => println!("applied"),
        Mutation::Unchanged => println!("unchanged"),
    }
}

async fn show(client: &CallroomClient, event_id: &EventId) -> Result<()> {
    let Some(state) = client.bracket(event_id).await else {
        println!("no bracket for event {event_id}");
        return Ok(());
    };

    for (round, matches) in state.rounds.iter().enumerate() {
        println!("{}", round_label(state.total_rounds, round));
        for (index, bout) in matches.iter().enumerate() {
            let lane = client
                .lane_for(event_id, MatchRef::Main { round, index })
                .await?
                .map(|lane| lane.name)
                .unwrap_or_default();
            println!(
                "  {index:>2} [{lane}] {} vs {}  winner: {}",
                display_fencer(bout.slot1.as_ref()),
                display_fencer(bout.slot2.as_ref()),
                display_fencer(bout.winner.as_ref()),
            );
        }
    }
    for (round, placement) in state.consolation_rounds.iter().enumerate() {
        println!("{}", placement.title);
        for (index, bout) in placement.matches.iter().enumerate() {
            let lane = client
                .lane_for(event_id, MatchRef::Consolation { round, index })
                .await?
                .map(|lane| lane.name)
                .unwrap_or_default();
            println!(
                "  {index:>2} [{lane}] {} vs {}  winner: {}",
                display_fencer(bout.slot1.as_ref()),
                display_fencer(bout.slot2.as_ref()),
                display_fencer(bout.winner.as_ref()),
            );
        }
    }
    Ok(())
}

async fn groups(client: &CallroomClient, event_id: &EventId) {
    let Some(view) = client.current_groups(event_id).await else {
        println!("no bracket for event {event_id}");
        return;
    };

    let timer = view
        .start_time
        .as_deref()
        .and_then(|start| countdown(start, Local::now().naive_local()))
        .map(|left| format!("  call {left}"))
        .unwrap_or_default();
    println!(
        "{}  group {}/{}{}{}",
        view.round_label,
        view.group + 1,
        view.group_count,
        view.start_time
            .as_deref()
            .map(|start| format!("  start {start}"))
            .unwrap_or_default(),
        timer,
    );
    if view.sides_confirmed || view.fully_arranged {
        println!(
            "  sides confirmed: {}  fully arranged: {}",
            view.sides_confirmed, view.fully_arranged
        );
    }
    for (lane, entry) in view.entries.iter().enumerate() {
        match entry {
            Some(entry) => println!(
                "  lane {} [{}] match {}: {} ({}) vs {} ({})",
                lane + 1,
                entry.assigned_lane.name,
                entry.match_index,
                display_fencer(entry.slot1.as_ref()),
                entry.attendance.slot1.as_str(),
                display_fencer(entry.slot2.as_ref()),
                entry.attendance.slot2.as_str(),
            ),
            None => println!("  lane {} —", lane + 1),
        }
    }
}
