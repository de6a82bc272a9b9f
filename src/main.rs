fn main() -> anyhow::Result<()> {
    careline::cli::run()
}
