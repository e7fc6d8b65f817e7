fn main() -> anyhow::Result<()> {
    brrtguard::cli::run_cli()
}
