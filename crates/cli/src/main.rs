fn main() -> anyhow::Result<()> {
    shenma_cli::run()
}
