fn main() -> Result<(), anyhow::Error> {
    dockopt::run()
}
