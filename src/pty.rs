#![allow(dead_code)]
/// Host side of the serial link: a Unix pseudo-terminal whose master end is
/// driven by the emulated ACIA and whose slave end is left for the user to
/// attach a terminal program to (e.g. `screen /dev/pts/N`).
use super::*;
use std::ffi::CStr;
use std::os::unix::io::RawFd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

const DEFAULT_BAUD_RATE: u32 = 300;
const MAX_SLAVE_DEVICE_NAME: usize = 128;

pub struct Pty {
    master_fd: RawFd,
    slave_name: String,
}

fn io_check(ret: i32, what: &str) -> Result<(), Error> {
    if ret < 0 {
        Err(io_err!("{} failed: {}", what, std::io::Error::last_os_error()))
    } else {
        Ok(())
    }
}

impl Pty {
    /// Acquires a pseudo-terminal pair and configures the line to 300 baud, 8N1.
    pub fn open() -> Result<Pty, Error> {
        let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        io_check(master_fd, "posix_openpt()")?;
        io_check(unsafe { libc::grantpt(master_fd) }, "grantpt()")?;
        io_check(unsafe { libc::unlockpt(master_fd) }, "unlockpt()")?;

        // ptsname_r reports failure with a nonzero errno return, not -1
        let mut name_buf = [0 as libc::c_char; MAX_SLAVE_DEVICE_NAME];
        if unsafe { libc::ptsname_r(master_fd, name_buf.as_mut_ptr(), name_buf.len()) } != 0 {
            return Err(io_err!("ptsname_r() failed: {}", std::io::Error::last_os_error()));
        }
        let slave_name = unsafe { CStr::from_ptr(name_buf.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let pty = Pty { master_fd, slave_name };
        pty.set_baud(DEFAULT_BAUD_RATE)?;
        pty.configure(8, Parity::None, 1)?;
        Ok(pty)
    }

    /// Path of the slave device, for reporting.
    pub fn name(&self) -> &str { self.slave_name.as_str() }

    fn tcgetattr(&self) -> Result<libc::termios, Error> {
        let mut tty: libc::termios = unsafe { std::mem::zeroed() };
        io_check(unsafe { libc::tcgetattr(self.master_fd, &mut tty) }, "tcgetattr()")?;
        Ok(tty)
    }

    fn tcsetattr(&self, tty: &libc::termios) -> Result<(), Error> {
        io_check(
            unsafe { libc::tcsetattr(self.master_fd, libc::TCSANOW, tty) },
            "tcsetattr()",
        )
    }

    /// Sets the nominal line speed. Rates with no matching termios constant
    /// are rejected as a validation error.
    pub fn set_baud(&self, rate: u32) -> Result<(), Error> {
        let speed = match rate {
            75 => libc::B75,
            110 => libc::B110,
            150 => libc::B150,
            300 => libc::B300,
            600 => libc::B600,
            1200 => libc::B1200,
            2400 => libc::B2400,
            4800 => libc::B4800,
            9600 => libc::B9600,
            19200 => libc::B19200,
            38400 => libc::B38400,
            _ => return Err(config_err!("unsupported baud rate {}", rate)),
        };
        let mut tty = self.tcgetattr()?;
        unsafe {
            libc::cfsetospeed(&mut tty, speed);
            libc::cfsetispeed(&mut tty, speed);
        }
        self.tcsetattr(&tty)
    }

    /// Configures line framing. Invalid combinations are validation errors.
    pub fn configure(&self, data_bits: u32, parity: Parity, stop_bits: u32) -> Result<(), Error> {
        let mut tty = self.tcgetattr()?;
        unsafe { libc::cfmakeraw(&mut tty) };

        tty.c_cflag &= !libc::CSIZE;
        tty.c_cflag |= match data_bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            8 => libc::CS8,
            _ => return Err(config_err!("invalid data_bits value {}", data_bits)),
        };

        match parity {
            Parity::None => tty.c_cflag &= !libc::PARENB,
            Parity::Even => {
                tty.c_cflag |= libc::PARENB;
                tty.c_cflag &= !libc::PARODD;
            }
            Parity::Odd => {
                tty.c_cflag |= libc::PARENB;
                tty.c_cflag |= libc::PARODD;
            }
        }

        match stop_bits {
            1 => tty.c_cflag &= !libc::CSTOPB,
            2 => tty.c_cflag |= libc::CSTOPB,
            _ => return Err(config_err!("invalid stop_bits value {}", stop_bits)),
        }

        tty.c_cflag |= libc::CLOCAL | libc::CREAD;
        tty.c_cc[libc::VMIN] = 1;
        tty.c_cc[libc::VTIME] = 0;

        self.tcsetattr(&tty)
    }

    /// Transmits a line break on the slave side.
    pub fn send_break(&self) -> Result<(), Error> {
        io_check(unsafe { libc::tcsendbreak(self.master_fd, 0) }, "tcsendbreak()")
    }

    /// Non-blocking probe for a pending byte from the slave side.
    pub fn poll(&self) -> Result<bool, Error> {
        let mut poll_ds = libc::pollfd {
            fd: self.master_fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut poll_ds, 1, 0) };
        if ret < 0 && std::io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
            return Err(io_err!("poll() failed: {}", std::io::Error::last_os_error()));
        }
        Ok(poll_ds.revents & libc::POLLIN != 0)
    }

    /// Blocking read of one byte.
    pub fn getch(&self) -> Result<u8, Error> {
        let mut byte = 0u8;
        let amount = unsafe { libc::read(self.master_fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        if amount != 1 {
            return Err(io_err!("read() failed: {}", std::io::Error::last_os_error()));
        }
        Ok(byte)
    }

    /// Blocking write of one byte.
    pub fn putch(&self, byte: u8) -> Result<(), Error> { self.send(&[byte]) }

    /// Blocking write of a buffer; partial writes are retried until complete.
    pub fn send(&self, data: &[u8]) -> Result<(), Error> {
        let mut total_wr = 0usize;
        while total_wr < data.len() {
            let amount = unsafe {
                libc::write(
                    self.master_fd,
                    data[total_wr..].as_ptr() as *const libc::c_void,
                    data.len() - total_wr,
                )
            };
            if amount < 0 {
                return Err(io_err!("write() failed: {}", std::io::Error::last_os_error()));
            }
            total_wr += amount as usize;
        }
        Ok(())
    }

    /// Blocking read of up to `max` bytes, stopping after the terminator.
    pub fn recv(&self, max: usize, terminator: u8) -> Result<Vec<u8>, Error> {
        if max == 0 {
            return Err(general_err!("recv() buffer max must be greater than 0"));
        }
        let mut data = Vec::new();
        while data.len() < max {
            let byte = self.getch()?;
            data.push(byte);
            if byte == terminator {
                break;
            }
        }
        Ok(data)
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if self.master_fd >= 0 {
            unsafe { libc::close(self.master_fd) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::{Read, Write};
    use std::time::Duration;

    fn open_slave(pty: &Pty) -> std::fs::File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(pty.name())
            .expect("slave side should be openable")
    }

    fn wait_for_pending(pty: &Pty) -> bool {
        for _ in 0..100 {
            if pty.poll().unwrap() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn open_produces_a_usable_slave_name() {
        let pty = Pty::open().unwrap();
        assert!(pty.name().starts_with("/dev/"));
        let _slave = open_slave(&pty);
    }

    #[test]
    fn slave_to_master_getch_and_poll() {
        let pty = Pty::open().unwrap();
        let mut slave = open_slave(&pty);

        assert!(!pty.poll().unwrap());
        slave.write_all(b"H").unwrap();
        assert!(wait_for_pending(&pty));
        assert_eq!(pty.getch().unwrap(), b'H');
        assert!(!pty.poll().unwrap());
    }

    #[test]
    fn master_to_slave_putch_and_send() {
        let pty = Pty::open().unwrap();
        let mut slave = open_slave(&pty);

        pty.putch(b'Z').unwrap();
        let mut buf = [0u8; 1];
        slave.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Z");

        pty.send(b"hello").unwrap();
        let mut buf = [0u8; 5];
        slave.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn recv_stops_at_the_terminator() {
        let pty = Pty::open().unwrap();
        let mut slave = open_slave(&pty);

        slave.write_all(b"abc\rxyz").unwrap();
        assert_eq!(pty.recv(64, b'\r').unwrap(), b"abc\r");
        assert_eq!(pty.recv(3, b'\r').unwrap(), b"xyz");
    }

    #[test]
    fn framing_validation_rejects_bad_values() {
        let pty = Pty::open().unwrap();
        assert_eq!(pty.configure(9, Parity::None, 1).unwrap_err().kind, ErrorKind::Config);
        assert_eq!(pty.configure(8, Parity::None, 3).unwrap_err().kind, ErrorKind::Config);
        assert_eq!(pty.set_baud(12345).unwrap_err().kind, ErrorKind::Config);
        pty.configure(7, Parity::Even, 2).unwrap();
        pty.set_baud(9600).unwrap();
        pty.send_break().unwrap();
    }
}
