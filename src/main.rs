use exam_oefenen::config::ServerConfig;
use exam_oefenen::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = ServerConfig::from_env();
    server::serve(config).await
}
