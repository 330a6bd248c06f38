mod infrastructure;
mod runner;

fn main() {
    runner::run();
}
