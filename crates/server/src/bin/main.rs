use srql_server::SrqlServer;

#[derive(clap::Parser)]
struct Args {
    #[arg(long, default_value = "config/srql.yaml")]
    config: String,

    /// Expose Prometheus metrics on /metrics.
    #[arg(long)]
    observability: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    SrqlServer::new()
        .with_config(&args.config)
        .with_observability(args.observability)
        .run()
        .await
}
