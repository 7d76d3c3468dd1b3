//! Ticketflow board composition root.

#![forbid(unsafe_code)]

mod board_command;
mod board_config;
mod dev_seed;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use ticketflow_application::{
    AuthorizationService, BoardEvents, BoardState, BoardSynchronizer, MoveOutcome,
    StatusRegistry, StatusRepository, TicketChangeSink, TicketRepository, TicketStore,
};
use ticketflow_core::{AppError, AppResult};
use ticketflow_domain::{BoardColumn, PermissionGrants, Ticket, TicketId};
use ticketflow_infrastructure::{HttpBoardRepository, InMemoryBoardRepository};
use tracing::{info, warn};

use crate::board_command::{BoardCli, BoardCommand};
use crate::board_config::{BoardConfig, RemoteConfig, init_tracing};

const HTTP_MAX_ATTEMPTS: u8 = 3;
const HTTP_RETRY_BACKOFF_MS: u64 = 250;

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum ColumnsReport<'a> {
    Loading,
    Ready {
        columns: &'a [BoardColumn],
    },
}

#[derive(Debug, Serialize)]
struct MoveReport {
    outcome: &'static str,
    ticket: Option<Ticket>,
}

/// Mirrors confirmations and rollbacks into the log.
struct LoggingChangeSink;

impl TicketChangeSink for LoggingChangeSink {
    fn ticket_confirmed(&self, ticket: &Ticket) {
        info!(
            ticket_id = %ticket.id(),
            status_id = %ticket.status_id(),
            "ticket move confirmed"
        );
    }

    fn ticket_rolled_back(&self, ticket_id: &TicketId, error: &AppError) {
        warn!(ticket_id = %ticket_id, error = %error, "ticket move rolled back");
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let command = BoardCli::parse().command();
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BoardConfig::load()?;
    let board = build_board(&config).await?;

    let result = run_command(&board, command).await;
    board.close();
    result
}

async fn build_board(config: &BoardConfig) -> AppResult<BoardSynchronizer> {
    let status_repository: Arc<dyn StatusRepository>;
    let ticket_repository: Arc<dyn TicketRepository>;
    match &config.remote {
        Some(remote) => {
            let repository = Arc::new(build_http_repository(remote)?);
            info!(base_url = %remote.base_url, "using remote persistence");
            status_repository = repository.clone();
            ticket_repository = repository;
        }
        None => {
            let repository = Arc::new(InMemoryBoardRepository::new());
            dev_seed::run(&repository, config.tenant_id).await?;
            status_repository = repository.clone();
            ticket_repository = repository;
        }
    }

    let events = BoardEvents::default();
    let authorization_service = AuthorizationService::new(PermissionGrants::reference());
    let registry = StatusRegistry::new(
        authorization_service.clone(),
        status_repository,
        events.clone(),
    );
    let store = TicketStore::new(authorization_service, ticket_repository, registry, events);

    Ok(BoardSynchronizer::new(
        config.actor(),
        config.project_id.clone(),
        store,
        config.sync,
    )
    .with_change_sink(Arc::new(LoggingChangeSink)))
}

fn build_http_repository(remote: &RemoteConfig) -> AppResult<HttpBoardRepository> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    HttpBoardRepository::new(
        http_client,
        remote.base_url.as_str(),
        remote.api_token.as_str(),
        HTTP_MAX_ATTEMPTS,
        HTTP_RETRY_BACKOFF_MS,
    )
}

async fn run_command(board: &BoardSynchronizer, command: BoardCommand) -> AppResult<()> {
    match command {
        BoardCommand::Columns => {
            board.load().await?;
            match board.list_board_columns().await {
                BoardState::Loading => print_json(&ColumnsReport::Loading),
                BoardState::Ready(view) => print_json(&ColumnsReport::Ready {
                    columns: view.columns(),
                }),
            }
        }
        BoardCommand::Statuses => print_json(&board.refresh_statuses().await),
        BoardCommand::Move {
            ticket_id,
            status_id,
        } => {
            board.load().await?;
            let report = match board.move_ticket(&ticket_id, &status_id).await? {
                MoveOutcome::Unchanged => MoveReport {
                    outcome: "unchanged",
                    ticket: None,
                },
                MoveOutcome::Confirmed(ticket) => MoveReport {
                    outcome: "confirmed",
                    ticket: Some(ticket),
                },
                MoveOutcome::Discarded => MoveReport {
                    outcome: "discarded",
                    ticket: None,
                },
            };
            print_json(&report)
        }
        BoardCommand::Reorder { ordered_ids } => {
            print_json(&board.reorder_statuses(&ordered_ids).await?)
        }
    }
}

fn print_json<T>(value: &T) -> AppResult<()>
where
    T: Serialize + ?Sized,
{
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}
