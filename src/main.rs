pub mod cli;
pub mod ir;
pub mod jq_exec;
pub mod path_de;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod spec;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
