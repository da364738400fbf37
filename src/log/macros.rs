#[macro_export]
#[doc(hidden)]
macro_rules! __log_impl_filtered {
    ($level:expr, $($arg:tt)*) => {
        if $crate::log::is_enabled($level) {
            $crate::log::dispatch($level, format_args!($($arg)*));
        }
    };
}

/// Logs a message at the ERROR level.
#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => {
        $crate::__log_impl_filtered!($crate::log::LogLevel::Error, $($arg)*)
    }
}

/// Logs a message at the WARN level.
#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => {
        $crate::__log_impl_filtered!($crate::log::LogLevel::Warn, $($arg)*)
    }
}

/// Logs a message at the INFO level.
#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => {
        $crate::__log_impl_filtered!($crate::log::LogLevel::Info, $($arg)*)
    }
}

/// Logs a message at the DEBUG level.
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => {
        $crate::__log_impl_filtered!($crate::log::LogLevel::Debug, $($arg)*)
    }
}
