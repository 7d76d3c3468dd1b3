use std::env;
use std::str::FromStr;
use std::time::Duration;

use ticketflow_application::BoardSyncConfig;
use ticketflow_core::{AppError, AppResult, Role, TenantId, UserIdentity};
use ticketflow_domain::ProjectId;
use tracing_subscriber::EnvFilter;

const DEV_TENANT_ID: &str = "11111111-1111-1111-1111-111111111111";
const DEV_SUBJECT: &str = "dev-manager";
const DEV_DISPLAY_NAME: &str = "Dev Manager";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_token: String,
}

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub remote: Option<RemoteConfig>,
    pub tenant_id: TenantId,
    pub subject: String,
    pub display_name: String,
    pub role: Role,
    pub project_id: Option<ProjectId>,
    pub sync: BoardSyncConfig,
}

impl BoardConfig {
    pub fn load() -> AppResult<Self> {
        let remote = match optional_env("TICKETFLOW_API_BASE_URL") {
            Some(base_url) => Some(RemoteConfig {
                base_url,
                api_token: required_non_empty_env("TICKETFLOW_API_TOKEN")?,
            }),
            None => None,
        };

        let tenant_id = optional_env("TICKETFLOW_TENANT_ID")
            .unwrap_or_else(|| DEV_TENANT_ID.to_owned());
        let tenant_id = uuid::Uuid::parse_str(tenant_id.as_str())
            .map(TenantId::from_uuid)
            .map_err(|error| {
                AppError::Validation(format!("invalid TICKETFLOW_TENANT_ID '{tenant_id}': {error}"))
            })?;

        let subject = optional_env("TICKETFLOW_SUBJECT").unwrap_or_else(|| DEV_SUBJECT.to_owned());
        let display_name =
            optional_env("TICKETFLOW_DISPLAY_NAME").unwrap_or_else(|| DEV_DISPLAY_NAME.to_owned());
        let role = optional_env("TICKETFLOW_ROLE")
            .map(|value| {
                Role::from_str(value.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid TICKETFLOW_ROLE: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(Role::Manager);
        let project_id = optional_env("TICKETFLOW_PROJECT_ID")
            .map(|value| {
                ProjectId::new(value).map_err(|error| {
                    AppError::Validation(format!("invalid TICKETFLOW_PROJECT_ID: {error}"))
                })
            })
            .transpose()?;

        let persist_timeout_ms = parse_env_u64("TICKETFLOW_PERSIST_TIMEOUT_MS", 10_000)?;
        if persist_timeout_ms == 0 {
            return Err(AppError::Validation(
                "TICKETFLOW_PERSIST_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }
        let transient_retries = parse_env_u8("TICKETFLOW_TRANSIENT_RETRIES", 1)?;

        Ok(Self {
            remote,
            tenant_id,
            subject,
            display_name,
            role,
            project_id,
            sync: BoardSyncConfig {
                persist_timeout: Duration::from_millis(persist_timeout_ms),
                transient_retries,
            },
        })
    }

    pub fn actor(&self) -> UserIdentity {
        UserIdentity::new(
            self.subject.as_str(),
            self.display_name.as_str(),
            None,
            self.tenant_id,
            Some(self.role),
        )
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match optional_env(name) {
        Some(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_env_u8(name: &str, default: u8) -> AppResult<u8> {
    match optional_env(name) {
        Some(value) => value.parse::<u8>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
