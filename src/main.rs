use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;

use strade::app::bootstrap::{self, Pipeline};
use strade::app_config::log::setup_logging;
use strade::app_config::settings::TradeSettings;

#[derive(Parser, Debug)]
#[command(name = "strade", version, about = "策略信号下单与对账")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按 TICK_CRON 定时跑策略 tick
    Scheduler,
    /// 立即跑一次 tick
    Tick {
        /// 默认读取 STRATEGY_ID
        #[arg(long)]
        strategy_id: Option<i64>,
    },
    /// 消费 redis 队列中的对账任务
    Worker,
    /// 手动对账一笔订单
    Reconcile {
        #[arg(long)]
        user_trade_id: i64,
        #[arg(long)]
        order_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    // 设置日志
    let _log_guard = setup_logging().await?;

    let settings = TradeSettings::from_env()?;
    info!("启动 strade: {:?}", cli.command);
    let pipeline = Pipeline::build(settings).await?;

    match cli.command {
        Command::Scheduler => bootstrap::run_scheduler(pipeline).await?,
        Command::Tick { strategy_id } => {
            let strategy_id = strategy_id.unwrap_or(pipeline.settings.strategy_id);
            bootstrap::run_single_tick(&pipeline, strategy_id).await?
        }
        Command::Worker => bootstrap::run_worker(pipeline).await?,
        Command::Reconcile {
            user_trade_id,
            order_id,
        } => bootstrap::run_reconcile(&pipeline, user_trade_id, &order_id).await?,
    }
    Ok(())
}
