//! Subsystem tagged log macros. Lines go out over RTT on the board and to stdout on a host
//! build, e.g. `E (SD Card) Failed to open file for writing`.

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:literal, $tag:expr, $($arg:tt)+) => {{
        #[cfg(target_arch = "arm")]
        $crate::rtt_target::rprintln!("{} ({}) {}", $level, $tag, format_args!($($arg)+));

        #[cfg(all(not(target_arch = "arm"), any(test, feature = "std")))]
        std::println!("{} ({}) {}", $level, $tag, format_args!($($arg)+));

        #[cfg(all(not(target_arch = "arm"), not(any(test, feature = "std"))))]
        {
            let _ = $tag;
        }
    }};
}

/// Log an error for subsystem `$tag`.
#[macro_export]
macro_rules! log_error {
    ($tag:expr, $($arg:tt)+) => { $crate::__log!("E", $tag, $($arg)+) };
}

/// Log a warning for subsystem `$tag`.
#[macro_export]
macro_rules! log_warn {
    ($tag:expr, $($arg:tt)+) => { $crate::__log!("W", $tag, $($arg)+) };
}

/// Log progress for subsystem `$tag`.
#[macro_export]
macro_rules! log_info {
    ($tag:expr, $($arg:tt)+) => { $crate::__log!("I", $tag, $($arg)+) };
}
