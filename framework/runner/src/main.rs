use plateau_sweep_runner::prelude::*;

fn main() -> SweepResult<()> {
    let cli = init();

    run(cli)?;

    Ok(())
}
