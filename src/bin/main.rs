fn main() {
    tally::main()
}
