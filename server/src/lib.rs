//! # Race Session Arbitration Server
//!
//! This library is the server-side authority for shared race sessions. Each
//! participant submits end-of-race telemetry; the engine validates it,
//! merges it into the authoritative session state, computes the aggregate
//! outcome, and fans out results and side effects (rewards, vehicle damage,
//! achievement progress, DNF countdowns) to every other participant.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Result Merging
//! Exactly one result per player per session. A race record's finish reason
//! moves from zero to a terminal code exactly once; replayed or duplicated
//! submissions fail and are treated as a security violation rather than a
//! routine error.
//!
//! ### Outcome Aggregation
//! Every successful submission returns the full entrant list of its session
//! as currently stored — including the row the submission just wrote — plus
//! the submitter's reward and damage deltas.
//!
//! ### DNF Countdown
//! When a session's winner finishes and the event has DNF enabled, every
//! unfinished participant is put on a countdown. Finishing normally cancels
//! it; letting it elapse stamps the reserved DNF code and synthesizes an
//! outcome. Fire and cancel race against each other by design, and exactly
//! one ever wins for a given countdown.
//!
//! ## Architecture
//!
//! The [`arbiter`] module owns every cross-cutting step of the pipeline;
//! [`modes`] handlers only know how to merge their telemetry shape into a
//! record. Persistence goes through the narrow [`store`] contract, realtime
//! delivery through the fire-and-forget [`notify`] contract (optionally
//! backed by the [`relay`] link), and scheduled kicks through the token
//! arbitrated [`dnf`] state machine. The [`network`] module is a thin UDP
//! front end over the engine; [`scoring`] and [`matchmaking`] are the
//! collaborator seams for value computation and queue membership.
//!
//! ## Concurrency Model
//!
//! Submissions arrive concurrently, often several for the same session
//! within milliseconds. The unit of mutual exclusion is the (session,
//! player) race record: a per-pair lock serializes its read-modify-write,
//! and the DNF fire path takes the same lock. Independent sessions never
//! contend. Notification is best-effort and can never block or fail a
//! submission.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::arbiter::{AllowAll, Arbiter};
//! use server::dnf::DnfScheduler;
//! use server::matchmaking::MatchmakingQueue;
//! use server::network::Server;
//! use server::notify::ChannelNotifier;
//! use server::scoring::ScoringTriggers;
//! use server::store::InMemorySessionStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemorySessionStore::new());
//!     let (dnf, dnf_rx) = DnfScheduler::new(Duration::from_secs(60));
//!     let arbiter = Arc::new(Arbiter::new(
//!         store.clone(),
//!         Arc::new(ChannelNotifier::new()),
//!         ScoringTriggers::default(),
//!         Arc::new(MatchmakingQueue::new()),
//!         Arc::new(dnf),
//!         Box::new(AllowAll),
//!     ));
//!
//!     let mut server = Server::new("127.0.0.1:9080", store, arbiter, dnf_rx).await?;
//!     server.run().await
//! }
//! ```

pub mod arbiter;
pub mod dnf;
pub mod error;
pub mod matchmaking;
pub mod modes;
pub mod network;
pub mod notify;
pub mod relay;
pub mod scoring;
pub mod store;
pub mod utils;
