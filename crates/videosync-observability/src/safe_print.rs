// Stderr logging that ignores write failures.
//
// Packaged Windows builds run without a console, where `eprintln!` can panic
// when stderr is gone. Worker supervision must never die on a log line.

#[macro_export]
macro_rules! safe_eprintln {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), $($arg)*);
    }};
}
