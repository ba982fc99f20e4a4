use std::cell::RefCell;
use std::path::Path;

use guard_core::manifest::Manifest;
use guard_core::reduce::{self, ReduceError, ALLOWED_SYMBOLS};
use guard_core::tools::{ToolError, ToolOutput, ToolRunner};

/// Scripted runner: the first call (the listing) returns canned output, and
/// every call is recorded so tests can assert the exact command shapes.
struct FakeRunner {
    listing: String,
    fail_on_call: Option<usize>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    fn new(listing: &str) -> Self {
        Self { listing: listing.to_string(), fail_on_call: None, calls: RefCell::new(Vec::new()) }
    }

    fn failing_on_call(listing: &str, call: usize) -> Self {
        Self {
            listing: listing.to_string(),
            fail_on_call: Some(call),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        let call_index = {
            let mut calls = self.calls.borrow_mut();
            calls.push((program.to_string(), args.to_vec()));
            calls.len() - 1
        };
        if self.fail_on_call == Some(call_index) {
            return Err(ToolError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "scripted failure"),
            });
        }
        let stdout = if call_index == 0 { self.listing.clone() } else { String::new() };
        Ok(ToolOutput { stdout })
    }
}

#[test]
fn reduction_keeps_only_unit_prefixed_symbols() {
    let listing = "0000000000001000 T unitA.foo\n\
                   0000000000001010 t unitA.foo_\n\
                   0000000000001020 T unitB.bar\n\
                   0000000000001030 T main.main\n\
                   0000000000001040 T util.String.new_\n";
    let runner = FakeRunner::new(listing);
    let manifest = Manifest::from_units(["unitA", "unitB"]);

    let report = reduce::reduce_binary(&runner, Path::new("app"), &manifest).expect("reduce");
    assert_eq!(report.listed, 5);
    assert_eq!(report.reduced, vec!["unitA.foo", "unitA.foo_", "unitB.bar"]);
}

#[test]
fn allow_listed_symbols_survive_even_in_known_units() {
    let listing = "0000000000002000 T main.main\n\
                   0000000000002010 T main.main_\n\
                   0000000000002020 T main.helper\n\
                   0000000000002030 T util.lock\n\
                   0000000000002040 T util.lock_\n\
                   0000000000002050 T util.scratch\n";
    let runner = FakeRunner::new(listing);
    let manifest = Manifest::from_units(["main", "util"]);

    let report = reduce::reduce_binary(&runner, Path::new("app"), &manifest).expect("reduce");
    assert_eq!(report.reduced, vec!["main.helper", "util.scratch"]);
}

#[test]
fn prefix_match_requires_the_unit_separator() {
    let symbols =
        vec!["unitAx.foo".to_string(), "unitA".to_string(), "unitA.ok".to_string()];
    let manifest = Manifest::from_units(["unitA"]);
    assert_eq!(reduce::reduction_set(&symbols, &manifest), vec!["unitA.ok"]);
}

#[test]
fn symbol_names_take_the_final_field_of_each_line() {
    let listing = "0000000000001000 T unitA.foo\n                 U malloc\n\n0000000000001010 t unitA.foo_\n";
    assert_eq!(reduce::symbol_names(listing), vec!["unitA.foo", "malloc", "unitA.foo_"]);
}

#[test]
fn strip_receives_one_pair_per_symbol_plus_binary_and_preserve_flag() {
    let listing = "0000000000001000 T unitA.foo\n0000000000001010 T unitA.bar\n";
    let runner = FakeRunner::new(listing);
    let manifest = Manifest::from_units(["unitA"]);

    reduce::reduce_binary(&runner, Path::new("zig-out/bin/app"), &manifest).expect("reduce");

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 2);

    let nm_args: Vec<&str> = calls[0].1.iter().map(String::as_str).collect();
    assert_eq!(nm_args, ["zig-out/bin/app"]);

    let strip_args: Vec<&str> = calls[1].1.iter().map(String::as_str).collect();
    assert_eq!(strip_args, ["-N", "unitA.foo", "-N", "unitA.bar", "zig-out/bin/app", "-g"]);
}

#[test]
fn strip_still_runs_when_nothing_matches() {
    let runner = FakeRunner::new("0000000000001000 T other.sym\n");
    let manifest = Manifest::from_units(["unitA"]);

    let report = reduce::reduce_binary(&runner, Path::new("app"), &manifest).expect("reduce");
    assert!(report.reduced.is_empty());

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 2);
    let strip_args: Vec<&str> = calls[1].1.iter().map(String::as_str).collect();
    assert_eq!(strip_args, ["app", "-g"]);
}

#[test]
fn listing_failure_aborts_before_strip() {
    let runner = FakeRunner::failing_on_call("", 0);
    let manifest = Manifest::from_units(["unitA"]);

    let err = reduce::reduce_binary(&runner, Path::new("app"), &manifest).expect_err("fail");
    assert!(matches!(err, ReduceError::List(_)));
    assert_eq!(runner.calls.borrow().len(), 1);
}

#[test]
fn strip_failure_surfaces() {
    let runner = FakeRunner::failing_on_call("0000000000001000 T unitA.foo\n", 1);
    let manifest = Manifest::from_units(["unitA"]);

    let err = reduce::reduce_binary(&runner, Path::new("app"), &manifest).expect_err("fail");
    assert!(matches!(err, ReduceError::Strip(_)));
}

#[test]
fn allow_list_carries_both_variants_of_each_symbol() {
    for sym in ALLOWED_SYMBOLS {
        if let Some(base) = sym.strip_suffix('_') {
            assert!(ALLOWED_SYMBOLS.contains(&base), "missing public variant of {sym}");
        } else {
            let renamed = format!("{sym}_");
            assert!(
                ALLOWED_SYMBOLS.contains(&renamed.as_str()),
                "missing internal variant of {sym}"
            );
        }
    }
}

#[test]
fn tool_paths_honor_environment_overrides() {
    std::env::set_var("NM_BIN", "/opt/llvm/bin/llvm-nm");
    std::env::set_var("STRIP_BIN", "/opt/llvm/bin/llvm-strip");
    assert_eq!(reduce::resolve_nm(), "/opt/llvm/bin/llvm-nm");
    assert_eq!(reduce::resolve_strip(), "/opt/llvm/bin/llvm-strip");

    std::env::remove_var("NM_BIN");
    std::env::remove_var("STRIP_BIN");
    assert_eq!(reduce::resolve_nm(), "nm");
    assert_eq!(reduce::resolve_strip(), "strip");
}
