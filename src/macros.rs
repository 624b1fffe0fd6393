#![allow(unused_macros, dead_code)]
macro_rules! verbose_println {
    ($($p:expr),+) => {
        if (config::ARGS.verbose) {
            println!($($p),+);
        }
    }
}
macro_rules! info {
    ($($p:expr),+) => {
        println!(concat!(blue!("INFO"),": {}"),format_args!($($p),+))
    }
}

macro_rules! warn {
    ($($p:expr),+) => {
        println!(concat!(red!("WARNING"),": {}"),format_args!($($p),+))
    }
}
macro_rules! general_err {
    ($($msg:expr),+) => {
        Error::new(crate::ErrorKind::General, None, format!($($msg),+).as_str())
    };
}
macro_rules! config_err {
    ($($msg:expr),+) => {
        Error::new(
            crate::ErrorKind::Config,
            None,
            format!("{} {}", red!("Configuration Error"), format!($($msg),+)).as_str(),
        )
    };
}
macro_rules! io_err {
    ($($msg:expr),+) => {
        Error::new(crate::ErrorKind::Io, None, format!($($msg),+).as_str())
    };
}
macro_rules! runtime_err {
    ($ctx:expr,$($msg:expr),*) => {
        Error::new(
            ErrorKind::Runtime,
            $ctx,
            format!("{} {}", red!("Runtime Error"), format!($($msg),*)).as_str(),
        )
    };
}
macro_rules! color {
    ($color: literal, $msg: expr) => {
        concat!("\x1b[", $color, "m", $msg, "\x1b[0m")
    };
}
macro_rules! red {
    ($msg:expr) => {
        color!(91, $msg)
    };
}
macro_rules! green {
    ($msg:expr) => {
        color!(92, $msg)
    };
}
macro_rules! yellow {
    ($msg:expr) => {
        color!(93, $msg)
    };
}
macro_rules! blue {
    ($msg:expr) => {
        color!(94, $msg)
    };
}
