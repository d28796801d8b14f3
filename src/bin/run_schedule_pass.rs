// 定时任务入口: 执行一轮保养工单生成并输出汇总 JSON
//
// Usage:
//   cargo run --bin run_schedule_pass -- [db_path] ["YYYY-MM-DD HH:MM:SS"]
//
// 退出码: 0 = 成功 (含逐计划错误, 见 JSON 中的 errors); 1 = 整轮失败

use cmms_reliability::app::{commands, get_default_db_path, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cmms_reliability::logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);
    let now = args.next();

    let state = AppState::new(db_path)?;
    let summary = commands::run_generation(&state, now).await?;

    println!("{}", summary);
    Ok(())
}
