fn main() -> eyre::Result<()> {
    conduit_exec::lib_main()
}
