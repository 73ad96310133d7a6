fn main() -> eyre::Result<()> {
    conduit_splitter::lib_main()
}
