fn main() -> eyre::Result<()> {
    conduit_submatch::lib_main()
}
