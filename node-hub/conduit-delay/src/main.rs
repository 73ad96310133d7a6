fn main() -> eyre::Result<()> {
    conduit_delay::lib_main()
}
