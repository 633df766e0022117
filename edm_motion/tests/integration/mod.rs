mod common;

mod auto_tasks;
mod faults;
mod path_props;
mod pause_recovery;
mod shutdown;
mod startup;
