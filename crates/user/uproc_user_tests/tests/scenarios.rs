#![cfg(test)]

use uproc_kernel::{Outcome, Termination};
use uproc_user_tests::{CONSOLE_LINE, GARBAGE_LEN, ROUNDTRIP_DATA, boot, run, seed_files};

#[test]
fn concurrent_children_report_their_status() -> Result<(), anyhow::Error> {
    let kernel = boot();
    kernel.console().push_input(CONSOLE_LINE);
    let (outcome, output) = run(&kernel, "scenario.coff", &["scenario.coff"])?;
    assert!(output.contains("scenario: PASSED"), "{output}");
    assert!(output.contains("-> 1, status 10"), "{output}");
    assert!(output.contains("-> 1, status 19"), "{output}");
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    assert_eq!(
        kernel.fs().contents("roundtrip.txt").unwrap(),
        ROUNDTRIP_DATA
    );
    Ok(())
}

#[test]
fn console_input_arrives_late() -> Result<(), anyhow::Error> {
    let kernel = boot();
    kernel.spawn_root("readconsole.coff", &["readconsole.coff"])?;
    let (first, rest) = CONSOLE_LINE.split_at(4);
    kernel.console().push_input(first);
    kernel.console().push_input(rest);
    let outcome = kernel.wait();
    assert_eq!(
        outcome,
        Some(Outcome::Terminated(Termination::exited(19)))
    );
    Ok(())
}

#[test]
fn console_input_closed_early() -> Result<(), anyhow::Error> {
    let kernel = boot();
    kernel.console().push_input(b"CSS");
    kernel.console().close_input();
    let (outcome, output) = run(&kernel, "readconsole.coff", &["readconsole.coff"])?;
    assert!(output.contains("unexpected input \"CSS\""), "{output}");
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(-1)));
    Ok(())
}

#[test]
fn read_until_end_of_file() -> Result<(), anyhow::Error> {
    let kernel = boot();
    seed_files(&kernel)?;
    let (outcome, output) = run(&kernel, "readtest3.coff", &["readtest3.coff"])?;
    assert!(
        output.contains(&format!("Total Bytes Read: {GARBAGE_LEN}")),
        "{output}"
    );
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    Ok(())
}

#[test]
fn read_into_foreign_memory_fails() -> Result<(), anyhow::Error> {
    let kernel = boot();
    seed_files(&kernel)?;
    let (outcome, output) = run(&kernel, "readbadbuf.coff", &["readbadbuf.coff"])?;
    assert!(output.contains("readbadbuf: PASSED"), "{output}");
    assert!(output.contains("Bytes Read: -"), "{output}");
    assert_eq!(outcome, Outcome::Terminated(Termination::exited(0)));
    // the file itself is untouched
    assert_eq!(
        kernel.fs().contents("garbage.txt").as_deref().map(<[u8]>::len),
        Some(GARBAGE_LEN)
    );
    Ok(())
}
