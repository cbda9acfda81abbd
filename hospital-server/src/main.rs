//! 医院管理系统服务器主程序

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use hospital_admin::{
    config::write_default_config, init_logging, load_config, HospitalConfig, HospitalMetrics,
};
use hospital_core::UserRole;
use hospital_database::{DatabasePool, DatabaseQueries, NewUser, PoolSettings};
use hospital_web::{auth::hash_password, mailer::build_mailer, AppState, WebServer};
use tracing::{info, warn};

/// 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "hospital-server")]
#[command(about = "医院管理系统 HTTP 服务器")]
struct Args {
    /// 配置文件路径 (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// 监听地址，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 写出默认配置文件后退出
    #[arg(long, value_name = "PATH")]
    init_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.init_config {
        write_default_config(path).await?;
        println!("Default configuration written to {}", path);
        return Ok(());
    }

    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging, args.log_level.as_deref())?;
    info!("Starting hospital server...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let pool = DatabasePool::connect(&PoolSettings {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout: config.database.connect_timeout(),
    })
    .await
    .context("Failed to connect to database")?;

    let queries = DatabaseQueries::new(&pool);
    queries.create_tables().await.context("Failed to create tables")?;
    seed_admin(&queries, &config).await?;

    let metrics = HospitalMetrics::new()?;
    metrics.set_active_inpatients(queries.count_active_inpatients().await?);

    let mailer = build_mailer(&config.mail).context("Failed to set up mail delivery")?;
    let state = AppState::new(pool.clone(), config, metrics, mailer);

    WebServer::new(addr, state).run().await
}

/// 用户表为空时创建初始管理员
async fn seed_admin(queries: &DatabaseQueries<'_>, config: &HospitalConfig) -> Result<()> {
    if queries.count_users().await? > 0 {
        return Ok(());
    }

    let username = config.auth.bootstrap_admin_username.clone();
    let password_hash = hash_password(&config.auth.bootstrap_admin_password)?;
    queries
        .create_user(&NewUser {
            username: username.clone(),
            password_hash,
            full_name: "System Administrator".to_string(),
            email: None,
            phone: None,
            role: UserRole::Admin,
        })
        .await?;

    warn!("Created bootstrap admin account '{}', change its password", username);
    Ok(())
}
