//! Parses the signal names/numbers accepted on the `Kill` command line into
//! the raw signal number the `SandboxClient::signal` operation expects.

use std::convert::TryFrom;

use nix::sys::signal::Signal as NixSignal;

#[derive(Debug, thiserror::Error)]
#[error("invalid signal: {0}")]
pub struct InvalidSignal(String);

pub fn parse(s: &str) -> Result<i32, InvalidSignal> {
    use NixSignal::*;

    let signal = match s.to_ascii_uppercase().as_str() {
        "1" | "HUP" | "SIGHUP" => SIGHUP,
        "2" | "INT" | "SIGINT" => SIGINT,
        "3" | "QUIT" | "SIGQUIT" => SIGQUIT,
        "4" | "ILL" | "SIGILL" => SIGILL,
        "5" | "BUS" | "SIGBUS" => SIGBUS,
        "6" | "ABRT" | "IOT" | "SIGABRT" | "SIGIOT" => SIGABRT,
        "7" | "TRAP" | "SIGTRAP" => SIGTRAP,
        "8" | "FPE" | "SIGFPE" => SIGFPE,
        "9" | "KILL" | "SIGKILL" => SIGKILL,
        "10" | "USR1" | "SIGUSR1" => SIGUSR1,
        "11" | "SEGV" | "SIGSEGV" => SIGSEGV,
        "12" | "USR2" | "SIGUSR2" => SIGUSR2,
        "13" | "PIPE" | "SIGPIPE" => SIGPIPE,
        "14" | "ALRM" | "SIGALRM" => SIGALRM,
        "15" | "TERM" | "SIGTERM" => SIGTERM,
        "16" | "STKFLT" | "SIGSTKFLT" => SIGSTKFLT,
        "17" | "CHLD" | "SIGCHLD" => SIGCHLD,
        "18" | "CONT" | "SIGCONT" => SIGCONT,
        "19" | "STOP" | "SIGSTOP" => SIGSTOP,
        "20" | "TSTP" | "SIGTSTP" => SIGTSTP,
        "21" | "TTIN" | "SIGTTIN" => SIGTTIN,
        "22" | "TTOU" | "SIGTTOU" => SIGTTOU,
        "23" | "URG" | "SIGURG" => SIGURG,
        "24" | "XCPU" | "SIGXCPU" => SIGXCPU,
        "25" | "XFSZ" | "SIGXFSZ" => SIGXFSZ,
        "26" | "VTALRM" | "SIGVTALRM" => SIGVTALRM,
        "27" | "PROF" | "SIGPROF" => SIGPROF,
        "28" | "WINCH" | "SIGWINCH" => SIGWINCH,
        "29" | "IO" | "SIGIO" => SIGIO,
        "30" | "PWR" | "SIGPWR" => SIGPWR,
        "31" | "SYS" | "SIGSYS" => SIGSYS,
        _ => return Err(InvalidSignal(s.to_string())),
    };

    Ok(signal as i32)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use nix::sys::signal::Signal::*;

    use super::*;

    #[test]
    fn test_conversion_from_string() {
        let mut test_sets = HashMap::new();
        test_sets.insert(SIGHUP, vec!["1", "HUP", "SIGHUP"]);
        test_sets.insert(SIGKILL, vec!["9", "KILL", "SIGKILL"]);
        test_sets.insert(SIGTERM, vec!["15", "TERM", "SIGTERM"]);
        test_sets.insert(SIGCHLD, vec!["17", "CHLD", "SIGCHLD"]);
        for (signal, strings) in test_sets {
            for s in strings {
                assert_eq!(signal as i32, parse(s).unwrap());
            }
        }
    }

    #[test]
    fn test_conversion_from_string_should_be_failed() {
        assert!(parse("invalid").is_err())
    }

    #[test]
    fn test_conversion_accepts_try_from_roundtrip() {
        let raw = parse("SIGTERM").unwrap();
        assert_eq!(NixSignal::try_from(raw).unwrap(), SIGTERM);
    }
}
