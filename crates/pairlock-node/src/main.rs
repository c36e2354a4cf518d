//! Pairlock node.
//!
//! Runs a whole group in one process: every participant is a tokio task and
//! they talk over an in-process channel network. With `--cycles` the node
//! exits once every requester has finished; otherwise it runs until
//! interrupted.

mod logging;
mod system_env;

use std::{process::ExitCode, str::FromStr, time::Duration};

use clap::{Parser, ValueEnum};
use pairlock_app::{
    EventSink, LocalNetwork, RequesterRuntime, ResponderRuntime, RunEvent, RuntimeConfig,
    RuntimeError,
};
use pairlock_core::{coordinator::PairingPolicy, error::GroupError, group::GroupConfig};
use pairlock_proto::ParticipantId;
use system_env::SystemEnv;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(name = "pairlock-node", about = "Ricart-Agrawala mutex with responder pairing")]
struct Cli {
    /// Total participants
    #[arg(short = 'n', long, default_value_t = 6)]
    participants: u32,

    /// Requesters; defaults to half the participants
    #[arg(short, long)]
    requesters: Option<u32>,

    /// Critical-section visits per requester; unlimited when omitted
    #[arg(short, long)]
    cycles: Option<u64>,

    /// Think time before each request, in ms ("min-max" or a single value)
    #[arg(long, default_value = "1000-3000")]
    think_ms: MillisRange,

    /// Time spent in the critical section after pairing, in ms
    #[arg(long, default_value = "1000-3000")]
    hold_ms: MillisRange,

    /// How long a pairing is held, in ms
    #[arg(long, default_value_t = 1000)]
    dwell_ms: u64,

    /// Whether denied responders are asked again on later visits
    #[arg(long, value_enum, default_value_t = Policy::Retry)]
    policy: Policy,
}

impl Cli {
    fn group(&self) -> Result<GroupConfig, GroupError> {
        match self.requesters {
            Some(requesters) => GroupConfig::new(self.participants, requesters),
            None => GroupConfig::split_evenly(self.participants),
        }
    }

    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            think_time: self.think_ms.durations(),
            hold_time: self.hold_ms.durations(),
            pair_dwell: Duration::from_millis(self.dwell_ms),
            max_cycles: self.cycles,
            pairing_policy: self.policy.into(),
        }
    }
}

/// Inclusive millisecond range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MillisRange {
    min: u64,
    max: u64,
}

impl MillisRange {
    fn durations(self) -> (Duration, Duration) {
        (Duration::from_millis(self.min), Duration::from_millis(self.max))
    }
}

impl FromStr for MillisRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| v.trim().parse::<u64>().map_err(|e| format!("{v:?}: {e}"));
        let (min, max) = match s.split_once('-') {
            Some((min, max)) => (parse(min)?, parse(max)?),
            None => {
                let value = parse(s)?;
                (value, value)
            },
        };
        if min > max {
            return Err(format!("empty range {min}-{max}"));
        }
        Ok(Self { min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// Retry denied responders on later visits
    Retry,
    /// Ask every responder at most once
    Record,
}

impl From<Policy> for PairingPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Retry => Self::RetryDenied,
            Policy::Record => Self::RecordDenied,
        }
    }
}

#[derive(Debug, Error)]
enum NodeError {
    #[error("invalid group: {0}")]
    Group(#[from] GroupError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("participant task failed: {0}")]
    Join(#[from] JoinError),

    #[error("no endpoint for participant {0}")]
    MissingEndpoint(ParticipantId),

    #[error("signal handler failed: {0}")]
    Signal(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "node failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<(), NodeError> {
    let group = cli.group()?;
    let config = cli.runtime_config();
    let mut network = LocalNetwork::new(0..group.participants());
    let (sink, mut events) = EventSink::channel();
    let mut tasks = JoinSet::new();

    for id in group.requesters() {
        let transport = network.endpoint(id).ok_or(NodeError::MissingEndpoint(id))?;
        let runtime = RequesterRuntime::new(group, SystemEnv, transport, config.clone())?
            .with_events(sink.clone());
        tasks.spawn(runtime.run());
    }
    for id in group.responders() {
        let transport = network.endpoint(id).ok_or(NodeError::MissingEndpoint(id))?;
        let runtime = ResponderRuntime::new(group, transport)?.with_events(sink.clone());
        tasks.spawn(runtime.run());
    }
    drop(sink);

    info!(
        participants = group.participants(),
        requesters = group.requester_count(),
        cycles = ?config.max_cycles,
        policy = ?config.pairing_policy,
        "group started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut finished = 0;

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.map_err(NodeError::Signal)?;
                info!("interrupted, shutting down");
                break;
            },
            Some(joined) = tasks.join_next() => {
                // Runtimes only return on failure.
                joined??;
            },
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                debug!(?event, "run event");
                if let RunEvent::CyclesCompleted { requester, cycles } = event {
                    info!(requester, cycles, "requester finished");
                    finished += 1;
                    if finished == group.requester_count() {
                        info!("all requesters finished");
                        break;
                    }
                }
            },
        }
    }

    tasks.abort_all();
    Ok(())
}
