//! Process control programs: `exec`, `join`, `exit` and `halt`.

use uproc_kernel::UserEnv;
use uproc_kernel_params::{MAX_ARG, PAGE_SIZE};

use crate::{expect, report, uprintln};

/// Runs `swap4.coff` and `write10.coff` and joins them in order.
pub fn join_sw(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let status = env.alloc(4);
    let mut pids = [0; 2];
    for (slot, prog) in pids.iter_mut().zip(["swap4.coff", "write10.coff"]) {
        uprintln!(env, "execing prog {prog}...");
        let pid = env.exec_args(prog, &[prog]);
        if pid <= 0 {
            uprintln!(env, "...failed (pid = {pid})");
            return -1;
        }
        uprintln!(env, "...passed");
        *slot = pid;
    }

    for (i, pid) in (1..).zip(pids) {
        uprintln!(env, "joining {pid}...");
        let r = env.join(pid, status);
        if r > 0 {
            let code = env.load_i32(status);
            uprintln!(env, "...passed (status from child {i} = {code})");
        } else if r == 0 {
            uprintln!(env, "...child {i} exited with unhandled exception");
            return -1;
        } else {
            uprintln!(env, "...failed (r = {r})");
            return -1;
        }
    }
    0
}

/// Swaps the halves of two pairs in its data segment.
pub fn swap4(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let array = env.alloc(4 * 4);
    for (i, v) in (0..4).zip(1..) {
        env.store_i32(array + i * 4, v);
    }
    for pair in [0, 2] {
        let a = env.load_i32(array + pair * 4);
        let b = env.load_i32(array + (pair + 1) * 4);
        env.store_i32(array + pair * 4, b);
        env.store_i32(array + (pair + 1) * 4, a);
    }
    let swapped = (0..4).map(|i| env.load_i32(array + i * 4)).collect::<Vec<_>>();
    if swapped == [2, 1, 4, 3] { 0 } else { 1 }
}

/// Writes ten numbered lines to console output.
///
/// Exits with the number of lines written.
pub fn write10(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let buf = env.alloc(16);
    let mut lines = 0;
    for i in 0..10 {
        let line = format!("write10: {i}\n");
        env.store(buf, line.as_bytes());
        let Ok(len) = i32::try_from(line.len()) else {
            return -1;
        };
        if env.write(1, buf, len) != len {
            return -1;
        }
        lines += 1;
    }
    lines
}

/// Runs two children concurrently and checks their exit statuses.
///
/// The first child round-trips ten bytes through a file, the second reads a
/// line from console input.
pub fn scenario(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let status = env.alloc(4);
    let c1 = env.exec_args("roundtrip.coff", &["roundtrip.coff"]);
    let c2 = env.exec_args("readconsole.coff", &["readconsole.coff"]);
    expect(env, &mut failures, "exec roundtrip.coff", c1 > 0);
    expect(env, &mut failures, "exec readconsole.coff", c2 > 0);

    for (pid, want) in [(c1, 10), (c2, 19)] {
        env.store_i32(status, 0);
        let r = env.join(pid, status);
        let got = env.load_i32(status);
        uprintln!(env, "join {pid} -> {r}, status {got}");
        expect(env, &mut failures, "join returns 1", r == 1);
        expect(env, &mut failures, "child exit status", got == want);
    }
    report(env, "scenario", failures)
}

/// Exits with the status given as the first argument.
pub fn exit_with(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let status = env
        .args(argc, argv)
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    env.exit(status)
}

/// Prints its arguments and exits with their count.
pub fn echo(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let args = env.args(argc, argv);
    uprintln!(env, "{}", args.join(" "));
    i32::try_from(argc).unwrap_or(-1)
}

pub fn join_errors(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let status = env.alloc(4);

    let pid = env.exec_args("exit.coff", &["exit.coff", "7"]);
    expect(env, &mut failures, "exec exit.coff", pid > 0);
    let r = env.join(pid, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "first join succeeds", r == 1 && code == 7);
    let r = env.join(pid, status);
    expect(env, &mut failures, "second join fails", r < 0);

    let r = env.join(9999, status);
    expect(env, &mut failures, "join unknown pid", r < 0);
    let r = env.join(0, status);
    expect(env, &mut failures, "join pid 0", r < 0);
    let r = env.join(-3, status);
    expect(env, &mut failures, "join negative pid", r < 0);

    // a bad status slot fails up front and leaves the child joinable
    let pid = env.exec_args("exit.coff", &["exit.coff", "3"]);
    let r = env.join(pid, 0);
    expect(env, &mut failures, "join with null status", r < 0);
    let r = env.join(pid, PAGE_SIZE);
    expect(env, &mut failures, "join with read-only status", r < 0);
    let r = env.join(pid, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "join after bad status", r == 1 && code == 3);

    // children may be joined in any order
    let first = env.exec_args("exit.coff", &["exit.coff", "1"]);
    let second = env.exec_args("exit.coff", &["exit.coff", "2"]);
    for (pid, want) in [(second, 2), (first, 1)] {
        let r = env.join(pid, status);
        let code = env.load_i32(status);
        expect(env, &mut failures, "join out of order", r == 1 && code == want);
    }

    report(env, "joinerrors", failures)
}

/// Exits without joining its child.
pub fn orphan(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let pid = env.exec_args("exit.coff", &["exit.coff", "4"]);
    if pid > 0 { 0 } else { -1 }
}

/// Starts a sibling pair where one child tries to join the other.
pub fn non_parent(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let status = env.alloc(4);

    let target = env.exec_args("exit.coff", &["exit.coff", "5"]);
    let target_arg = target.to_string();
    let joiner = env.exec_args("joinother.coff", &["joinother.coff", &target_arg]);
    expect(env, &mut failures, "exec children", target > 0 && joiner > 0);

    let r = env.join(joiner, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "sibling join was refused", r == 1 && code == 0);

    let r = env.join(target, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "parent still joins", r == 1 && code == 5);

    report(env, "nonparent", failures)
}

/// Tries to join the pid given as the first argument.
///
/// Exits with 0 if the kernel refused.
pub fn join_other(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let Some(pid) = env.args(argc, argv).get(1).and_then(|s| s.parse().ok()) else {
        return -1;
    };
    let status = env.alloc(4);
    if env.join(pid, status) < 0 { 0 } else { 1 }
}

/// Touches memory it does not own.
///
/// With the argument `text` it writes to its read-only text segment,
/// otherwise it writes through a null pointer.
pub fn fault(env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
    let fd = env.open_file("fault.txt");
    uprintln!(env, "fault: holding fd {fd}");
    let target = match env.args(argc, argv).get(1).map(String::as_str) {
        Some("text") => PAGE_SIZE,
        _ => 0,
    };
    env.store_i32(target, 42);
    0
}

pub fn panic(_env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    panic!("user program bug");
}

/// Exhausts a one-page data segment.
pub fn tiny(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    env.alloc(2 * PAGE_SIZE);
    0
}

/// Checks that every kind of crash reaches the parent as an abnormal exit.
pub fn join_faults(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let status = env.alloc(4);
    let crashes: [&[&str]; 4] = [
        &["fault.coff"],
        &["fault.coff", "text"],
        &["panic.coff"],
        &["tiny.coff"],
    ];
    for args in crashes {
        let pid = env.exec_args(args[0], args);
        let r = env.join(pid, status);
        uprintln!(env, "{}: join -> {r}", args.join(" "));
        expect(env, &mut failures, "crash is reported as 0", r == 0);
    }

    // the kernel keeps serving this process
    let pid = env.exec_args("exit.coff", &["exit.coff", "9"]);
    let r = env.join(pid, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "normal child after crashes", r == 1 && code == 9);

    report(env, "joinfaults", failures)
}

pub fn exec_errors(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;

    let r = env.exec_args("missing.coff", &[]);
    expect(env, &mut failures, "missing executable", r < 0);
    let r = env.exec_args("notes.txt", &[]);
    expect(env, &mut failures, "missing .coff suffix", r < 0);
    let r = env.exec_args("", &[]);
    expect(env, &mut failures, "empty path", r < 0);
    let r = env.exec(0, 0, 0);
    expect(env, &mut failures, "null path", r < 0);

    let path = env.alloc_cstr("echo.coff");
    let r = env.exec(path, -1, 0);
    expect(env, &mut failures, "negative argc", r < 0);
    let r = env.exec(path, 1, 0);
    expect(env, &mut failures, "null argv", r < 0);

    let too_many = vec!["x"; MAX_ARG + 1];
    let r = env.exec_args("echo.coff", &too_many);
    expect(env, &mut failures, "too many arguments", r < 0);

    let status = env.alloc(4);
    let pid = env.exec_args("echo.coff", &["echo.coff", "hello", "world"]);
    expect(env, &mut failures, "exec with arguments", pid > 0);
    let r = env.join(pid, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "argc reaches the child", r == 1 && code == 3);

    report(env, "execerrors", failures)
}

/// Leaves a child blocked on console input and halts the machine.
pub fn halt(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let pid = env.exec_args("sleeper.coff", &["sleeper.coff"]);
    uprintln!(env, "halt: started {pid}, halting");
    env.halt();
    uprintln!(env, "halt: still running");
    -1
}

/// Checks that a child may not halt, then halts.
pub fn halt_try(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let status = env.alloc(4);
    let pid = env.exec_args("haltchild.coff", &["haltchild.coff"]);
    let r = env.join(pid, status);
    let code = env.load_i32(status);
    expect(env, &mut failures, "child halt is refused", r == 1 && code == 0);
    report(env, "halttry", failures);
    env.halt()
}

pub fn halt_child(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let r = env.halt();
    uprintln!(env, "haltchild: halt -> {r}");
    if r < 0 { 0 } else { 1 }
}

/// Blocks on console input until it is closed.
pub fn sleeper(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let buf = env.alloc(1);
    while env.read(0, buf, 1) > 0 {}
    0
}

pub fn unknown_syscall(env: &mut UserEnv, _argc: usize, _argv: usize) -> i32 {
    let mut failures = 0;
    let r = env.syscall(42, [1, 2, 3, 4]);
    expect(env, &mut failures, "syscall 42", r < 0);
    let r = env.syscall(usize::MAX, [0; 4]);
    expect(env, &mut failures, "syscall -1", r < 0);
    report(env, "unknown", failures)
}
