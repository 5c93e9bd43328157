//! End-to-end CLI tests: each case writes a small source program to a temp
//! file and drives the real `mcc` binary against it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn mcc_bin() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_mcc"))
}

fn source_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp source file");
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn recursive_fibonacci() {
    let src = source_file(
        "int fib(int n) {
            if (n < 2) return 1;
            return fib(n - 1) + fib(n - 2);
        }
        int main() {
            printf(\"result: %d\\n\", fib(10));
            return 0;
        }",
    );

    Command::new(mcc_bin())
        .arg(src.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("result: 89"))
        .stdout(predicate::str::contains("exit(0) cycle ="));
}

#[test]
fn global_string_print() {
    let src = source_file("int main(){ printf(\"hello\\n\"); return 0; }");

    Command::new(mcc_bin())
        .arg(src.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("hello\n"))
        .stdout(predicate::str::contains("exit(0) cycle ="));
}

#[test]
fn enum_constants() {
    let src = source_file("enum { A, B = 8, C }; int main(){ return A + B + C; }");

    Command::new(mcc_bin())
        .arg(src.path())
        .assert()
        .code(17);
}

#[test]
fn pointer_arithmetic_through_malloc() {
    // Each element is a full `int` (word), so `p[i]` must land on
    // non-overlapping 8-byte slots; printf the whole array back out to
    // prove the stores didn't alias, not just the exit code (which
    // truncates to a byte and could hide corruption by coincidence).
    let src = source_file(
        "int main() {
            int *p;
            p = malloc(32);
            p[0] = 10; p[1] = 20; p[2] = 30; p[3] = 40;
            printf(\"%d %d %d %d\\n\", p[0], p[1], p[2], p[3]);
            return p[2];
        }",
    );

    Command::new(mcc_bin())
        .arg(src.path())
        .assert()
        .code(30)
        .stdout(predicate::str::starts_with("10 20 30 40\n"));
}

#[test]
fn prefix_vs_postfix_increment() {
    let src = source_file("int x; int main(){ x = 5; return x++ + ++x; }");

    Command::new(mcc_bin()).arg(src.path()).assert().code(12);
}

#[test]
fn short_circuit_and_avoids_null_deref() {
    let src = source_file("int main(){ int *p; p = 0; return p && *p; }");

    Command::new(mcc_bin()).arg(src.path()).assert().code(0);
}

#[test]
fn compile_only_listing_does_not_run_the_vm() {
    let src = source_file("int main(){ return 0; }");

    Command::new(mcc_bin())
        .arg("-s")
        .arg(src.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ENT"))
        .stdout(predicate::str::contains("LEV"))
        .stdout(predicate::str::contains("exit(").not());
}

#[test]
fn missing_main_is_a_compile_error() {
    let src = source_file("int f() { return 0; }");

    Command::new(mcc_bin())
        .arg(src.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("main function is not defined"));
}
