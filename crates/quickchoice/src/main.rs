use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    quickchoice::init();

    quickchoice::cli::Cli::parse().run().await
}
