fn main() {
    cashback_console_lib::run()
}
