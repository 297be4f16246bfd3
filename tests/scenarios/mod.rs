mod environment_selection;
mod failure_handling;
mod planning;
mod run_history;
mod stage_gating;
