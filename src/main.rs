// ==========================================
// 设备维修管理 - 命令行主入口
// ==========================================
// 用法:
//   cmms-reliability generate [--now "YYYY-MM-DD HH:MM:SS"]
//   cmms-reliability indicators [--tag T] [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--by-tag]
//   cmms-reliability import <work_orders.csv> [executions.csv] [--operator NAME]
//   cmms-reliability reset-sequence <DOC_TYPE> <OPERATOR> --role <ADMIN|PLANNER|TECHNICIAN>
//   cmms-reliability sequences
// 数据库: 环境变量 CMMS_DB_PATH, 否则为用户数据目录
// 语言: 环境变量 CMMS_LANG (zh-CN / en)
// ==========================================

use anyhow::{anyhow, bail, Result};

use cmms_reliability::app::{commands, get_default_db_path, AppState};
use cmms_reliability::i18n::t_with_args;

/// 审计与汇总文本语言 (zh-CN / en)
const LANG_ENV: &str = "CMMS_LANG";

const USAGE: &str = "用法: cmms-reliability <generate|indicators|import|reset-sequence|sequences> [选项]";

/// 解析后的命令行参数
struct CliArgs {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl CliArgs {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut positional = Vec::new();
        let mut options = Vec::new();
        let mut args = args.peekable();

        while let Some(arg) = args.next() {
            if let Some(name) = arg.strip_prefix("--") {
                let value = match args.peek() {
                    Some(next) if !next.starts_with("--") => args.next(),
                    _ => None,
                };
                options.push((name.to_string(), value));
            } else {
                positional.push(arg);
            }
        }

        Self {
            positional,
            options,
        }
    }

    fn value(&self, name: &str) -> Option<String> {
        self.options
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.clone())
    }

    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(k, _)| k == name)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    cmms_reliability::logging::init();
    if let Ok(lang) = std::env::var(LANG_ENV) {
        cmms_reliability::i18n::set_locale(lang.trim());
    }

    let mut raw = std::env::args().skip(1);
    let command = raw.next().ok_or_else(|| anyhow!(USAGE))?;
    let args = CliArgs::parse(raw);

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, version = cmms_reliability::VERSION, "启动");
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    let output = match command.as_str() {
        "generate" => run_generate(&state, &args).await?,
        "indicators" => run_indicators(&state, &args).await?,
        "import" => run_import(&state, &args).await?,
        "reset-sequence" => run_reset_sequence(&state, &args).await?,
        "sequences" => commands::list_sequences(&state)
            .await
            .map_err(|e| anyhow!(e))?,
        other => bail!("未知命令: {}\n{}", other, USAGE),
    };

    println!("{}", output);
    Ok(())
}

async fn run_generate(state: &AppState, args: &CliArgs) -> Result<String> {
    let json = commands::run_generation(state, args.value("now"))
        .await
        .map_err(|e| anyhow!(e))?;

    let summary: serde_json::Value = serde_json::from_str(&json)?;
    let count = |key: &str| -> String {
        match &summary[key] {
            serde_json::Value::Array(items) => items.len().to_string(),
            other => other.to_string(),
        }
    };
    tracing::info!(
        "{}",
        t_with_args(
            "generation.summary",
            &[
                ("created", count("created_count").as_str()),
                ("conflicts", count("skipped_conflicts").as_str()),
                ("errors", count("errors").as_str()),
            ],
        )
    );
    Ok(json)
}

async fn run_indicators(state: &AppState, args: &CliArgs) -> Result<String> {
    let result = if args.flag("by-tag") {
        commands::list_indicators_by_tag(state, args.value("from"), args.value("to")).await
    } else {
        commands::get_indicator_snapshot(
            state,
            args.value("tag"),
            args.value("from"),
            args.value("to"),
        )
        .await
    };
    result.map_err(|e| anyhow!(e))
}

async fn run_import(state: &AppState, args: &CliArgs) -> Result<String> {
    let work_orders = args
        .positional
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("缺少工单 CSV 路径\n{}", USAGE))?;
    let operator = args.value("operator").unwrap_or_else(|| "IMPORT".to_string());

    commands::import_history(state, work_orders, args.positional.get(1).cloned(), operator)
        .await
        .map_err(|e| anyhow!(e))
}

const RESET_USAGE: &str =
    "用法: cmms-reliability reset-sequence <DOC_TYPE> <OPERATOR> --role <ADMIN|PLANNER|TECHNICIAN>";

/// 解析 reset-sequence 参数: (单据类型, 操作人, 角色)
///
/// 角色必须显式给出, 由 API 层做权限判定
fn reset_sequence_args(args: &CliArgs) -> Result<(String, String, String)> {
    let (doc_type, operator) = match args.positional.as_slice() {
        [doc_type, operator, ..] => (doc_type.clone(), operator.clone()),
        _ => bail!("{}", RESET_USAGE),
    };
    let role = args
        .value("role")
        .ok_or_else(|| anyhow!("缺少 --role\n{}", RESET_USAGE))?;
    Ok((doc_type, operator, role))
}

async fn run_reset_sequence(state: &AppState, args: &CliArgs) -> Result<String> {
    let (doc_type, operator, role) = reset_sequence_args(args)?;
    commands::reset_sequence(state, doc_type, operator, role)
        .await
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_options_and_flags() {
        let args = cli(&["--tag", "P-101", "--by-tag", "--from", "2025-01-01"]);
        assert_eq!(args.value("tag").as_deref(), Some("P-101"));
        assert!(args.flag("by-tag"));
        assert_eq!(args.value("by-tag"), None);
        assert_eq!(args.value("from").as_deref(), Some("2025-01-01"));
        assert!(args.positional.is_empty());
    }

    #[test]
    fn test_reset_sequence_takes_role_from_option() {
        let args = cli(&["PREVENTIVE", "bob", "--role", "PLANNER"]);
        let (doc_type, operator, role) = reset_sequence_args(&args).unwrap();
        assert_eq!(doc_type, "PREVENTIVE");
        assert_eq!(operator, "bob");
        assert_eq!(role, "PLANNER");
    }

    #[test]
    fn test_reset_sequence_requires_role() {
        let args = cli(&["PREVENTIVE", "bob"]);
        assert!(reset_sequence_args(&args).is_err());

        let args = cli(&["PREVENTIVE", "--role", "ADMIN"]);
        assert!(reset_sequence_args(&args).is_err());
    }
}
