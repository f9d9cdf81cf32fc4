//! 配置校验模块
//!
//! 校验规则：
//! - request_timeout_secs > 0
//! - league_id 唯一且非空, 每个 league 至少配置一个 team id
//! - contact 名称与邮箱唯一
//! - calendar.event_duration_minutes > 0
//! - table.header_row >= 1
//! - service account 需要 client_email 与 PEM 私钥
//! - 已配置的 store 必填字段齐全

use std::collections::HashSet;

use contracts::{ContractError, SyncBlueprint};

/// 校验 SyncBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    validate_common(blueprint)?;
    validate_leagues(blueprint)?;
    validate_contacts(blueprint)?;
    validate_calendar(blueprint)?;
    validate_table(blueprint)?;
    validate_service_account(blueprint)?;
    Ok(())
}

fn validate_common(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    if blueprint.common.request_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "common.request_timeout_secs",
            "request_timeout_secs must be > 0",
        ));
    }
    Ok(())
}

/// 校验 league 配置
fn validate_leagues(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let Some(schedule) = &blueprint.schedule else {
        return Ok(());
    };

    let mut seen = HashSet::new();
    for (idx, league) in schedule.leagues.iter().enumerate() {
        if league.league_id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("schedule.leagues[{idx}].league_id"),
                "league_id cannot be empty",
            ));
        }
        if !seen.insert(league.league_id.as_str()) {
            return Err(ContractError::config_validation(
                format!("schedule.leagues[league_id={}]", league.league_id),
                "duplicate league_id",
            ));
        }
        if league.team_permanent_id.is_none() && league.team_season_id.is_none() {
            return Err(ContractError::config_validation(
                format!("schedule.leagues[league_id={}]", league.league_id),
                "either team_permanent_id or team_season_id is required",
            ));
        }
    }
    Ok(())
}

/// 校验联系人唯一性 (邮箱不区分大小写)
fn validate_contacts(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (name, email) in &blueprint.contacts {
        if email.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("contacts.{name}"),
                "email cannot be empty",
            ));
        }
        if !seen.insert(email.to_lowercase()) {
            return Err(ContractError::config_validation(
                format!("contacts.{name}"),
                format!("duplicate email '{email}'"),
            ));
        }
    }
    Ok(())
}

fn validate_calendar(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let Some(calendar) = &blueprint.calendar else {
        return Ok(());
    };

    if calendar.id.is_empty() {
        return Err(ContractError::config_validation(
            "calendar.id",
            "calendar id cannot be empty",
        ));
    }
    if calendar.event_duration_minutes <= 0 {
        return Err(ContractError::config_validation(
            "calendar.event_duration_minutes",
            format!(
                "event_duration_minutes must be > 0, got {}",
                calendar.event_duration_minutes
            ),
        ));
    }
    Ok(())
}

fn validate_table(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let Some(table) = &blueprint.table else {
        return Ok(());
    };

    if table.spreadsheet_id.is_empty() {
        return Err(ContractError::config_validation(
            "table.spreadsheet_id",
            "spreadsheet id cannot be empty",
        ));
    }
    if table.header_row == 0 {
        return Err(ContractError::config_validation(
            "table.header_row",
            "header_row is 1-based and must be >= 1",
        ));
    }
    Ok(())
}

fn validate_service_account(blueprint: &SyncBlueprint) -> Result<(), ContractError> {
    let Some(key) = &blueprint.google.service_account else {
        return Ok(());
    };

    if key.client_email.trim().is_empty() {
        return Err(ContractError::config_validation(
            "google.service_account.client_email",
            "client_email cannot be empty",
        ));
    }
    if !key.private_key.contains("PRIVATE KEY") {
        return Err(ContractError::config_validation(
            "google.service_account.private_key",
            "private_key must be a PEM encoded key",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        CalendarConfig, CommonConfig, ConfigVersion, GoogleCredentials, LeagueConfig,
        MatchingConfig, ScheduleConfig, ServiceAccountKey,
    };
    use std::collections::BTreeMap;

    fn minimal_blueprint() -> SyncBlueprint {
        SyncBlueprint {
            version: ConfigVersion::V1,
            common: CommonConfig {
                timezone: chrono_tz::Europe::Berlin,
                simulate: false,
                request_timeout_secs: 10,
                log_file: None,
            },
            matching: MatchingConfig::default(),
            calendar: Some(CalendarConfig {
                id: "cal".into(),
                event_duration_minutes: 120,
                reminder_minutes: 360,
                summary_prefix: "Scouting ".into(),
                api_base: "http://localhost".into(),
            }),
            table: None,
            schedule: Some(ScheduleConfig {
                base_url: "http://localhost".into(),
                leagues: vec![LeagueConfig {
                    name: "U16".into(),
                    league_id: "4711".into(),
                    team_permanent_id: Some(42),
                    team_season_id: None,
                }],
                arenas: BTreeMap::new(),
            }),
            cache: None,
            contacts: BTreeMap::from([("Alice".to_string(), "alice@example.org".to_string())]),
            google: GoogleCredentials::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_league_id() {
        let mut bp = minimal_blueprint();
        let schedule = bp.schedule.as_mut().unwrap();
        schedule.leagues.push(schedule.leagues[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate league_id"), "got: {err}");
    }

    #[test]
    fn test_league_without_team() {
        let mut bp = minimal_blueprint();
        bp.schedule.as_mut().unwrap().leagues[0].team_permanent_id = None;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("team_permanent_id"), "got: {err}");
    }

    #[test]
    fn test_duplicate_contact_email() {
        let mut bp = minimal_blueprint();
        bp.contacts
            .insert("Alias".to_string(), "ALICE@example.org".to_string());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate email"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout() {
        let mut bp = minimal_blueprint();
        bp.common.request_timeout_secs = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_invalid_event_duration() {
        let mut bp = minimal_blueprint();
        bp.calendar.as_mut().unwrap().event_duration_minutes = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("event_duration_minutes must be > 0"), "got: {err}");
    }

    #[test]
    fn test_service_account_needs_pem_key() {
        let mut bp = minimal_blueprint();
        bp.google.service_account = Some(ServiceAccountKey {
            client_email: "sync@scouting.iam.gserviceaccount.com".into(),
            private_key: "not a key".into(),
            ..Default::default()
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("PEM"), "got: {err}");
    }
}
