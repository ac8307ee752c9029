#![cfg(test)]

use uproc_kernel::{Outcome, ProcState, Termination};
use uproc_user_tests::{boot, run};

fn assert_passed(output: &str) {
    assert!(output.contains("PASSED"), "{output}");
    assert!(!output.contains("FAILED"), "{output}");
}

#[test]
fn join_sw() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "joinsw1.coff", &["joinsw1.coff"])?;
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)), "{output}");
    assert!(output.contains("...passed (status from child 1 = 0)"), "{output}");
    assert!(output.contains("...passed (status from child 2 = 10)"), "{output}");
    for i in 0..10 {
        assert!(output.contains(&format!("write10: {i}\n")), "{output}");
    }
    Ok(())
}

#[test]
fn join_errors() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "joinerrors.coff", &["joinerrors.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    Ok(())
}

#[test]
fn only_the_parent_may_join() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "nonparent.coff", &["nonparent.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    Ok(())
}

#[test]
fn crashes_are_reported_to_the_parent() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "joinfaults.coff", &["joinfaults.coff"])?;
    assert_passed(&output);
    assert!(output.contains("fault: holding fd 2"), "{output}");
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));

    // every crashed child was reaped, its files are closed
    let procs = kernel.processes();
    assert_eq!(procs.len(), 1, "{procs:?}");
    assert!(kernel.fs().exists("fault.txt"));
    Ok(())
}

#[test]
fn root_fault_is_abnormal() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, _) = run(&kernel, "fault.coff", &["fault.coff"])?;
    let Outcome::Terminated(termination) = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(termination.is_abnormal());
    Ok(())
}

#[test]
fn exec_errors() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "execerrors.coff", &["execerrors.coff"])?;
    assert_passed(&output);
    assert!(output.contains("echo.coff hello world\n"), "{output}");
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    Ok(())
}

#[test]
fn exit_status_of_root() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, _) = run(&kernel, "exit.coff", &["exit.coff", "-42"])?;
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(-42)));
    Ok(())
}

#[test]
fn orphans_stay_zombies() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, _) = run(&kernel, "orphan.coff", &["orphan.coff"])?;
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));

    let procs = kernel.processes();
    assert_eq!(procs.len(), 2, "{procs:?}");
    assert_eq!(procs[0].name, "orphan.coff");
    assert_eq!(procs[1].name, "exit.coff");
    assert_eq!(procs[1].parent, None);
    assert_eq!(procs[1].state, ProcState::Zombie(Termination::exited(4)));
    assert!(procs[0].pid < procs[1].pid);
    Ok(())
}

#[test]
fn root_can_halt() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "halt.coff", &["halt.coff"])?;
    assert_eq!(outcome, Outcome::Halted);
    assert!(output.contains("halting"), "{output}");
    assert!(!output.contains("still running"), "{output}");
    Ok(())
}

#[test]
fn only_root_can_halt() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "halttry.coff", &["halttry.coff"])?;
    assert_passed(&output);
    assert!(output.contains("haltchild: halt -> -"), "{output}");
    assert_eq!(outcome, Outcome::Halted);
    Ok(())
}

#[test]
fn unknown_syscall_is_not_fatal() -> Result<(), anyhow::Error> {
    let kernel = boot();
    let (outcome, output) = run(&kernel, "unknown.coff", &["unknown.coff"])?;
    assert_passed(&output);
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    Ok(())
}

#[test]
fn single_root() -> Result<(), anyhow::Error> {
    let kernel = boot();
    run(&kernel, "exit.coff", &["exit.coff"])?;
    assert!(kernel.run("exit.coff", &["exit.coff"]).is_err());
    assert!(boot().run("missing.coff", &[]).is_err());
    Ok(())
}
