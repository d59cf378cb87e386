//! C ABI. Every function returns `-1` on failure after the error has been
//! reported on stderr.

use core::ffi::c_int;

use scheduler_round_robin::{Entry, Error, Result, Tid};

use crate::ops::{self, report};

const FAILURE: c_int = -1;

fn status(result: Result<()>) -> c_int {
    result.map_or(FAILURE, |()| 0)
}

fn count(result: Result<u64>) -> c_int {
    result.map_or(FAILURE, saturate)
}

fn saturate(value: u64) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

fn tid_from_c(tid: c_int) -> Result<Tid> {
    Tid::try_from(tid).map_err(|_| Error::InvalidId(tid.into()))
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("error");
    // Leave a logger the host program installed in place.
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[no_mangle]
pub extern "C" fn uthread_init(quantum_usecs: c_int) -> c_int {
    init_logging();
    status(ops::init(quantum_usecs))
}

#[no_mangle]
pub extern "C" fn uthread_spawn(entry: Option<extern "C" fn()>) -> c_int {
    let tid = match entry {
        Some(entry) => ops::spawn_entry(Entry::Foreign(entry)),
        None => report(Err(Error::NullArgument)),
    };
    tid.map_or(FAILURE, |tid| saturate(tid as u64))
}

#[no_mangle]
pub extern "C" fn uthread_terminate(tid: c_int) -> c_int {
    status(report(tid_from_c(tid)).and_then(ops::terminate))
}

#[no_mangle]
pub extern "C" fn uthread_block(tid: c_int) -> c_int {
    status(report(tid_from_c(tid)).and_then(ops::block))
}

#[no_mangle]
pub extern "C" fn uthread_resume(tid: c_int) -> c_int {
    status(report(tid_from_c(tid)).and_then(ops::resume))
}

#[no_mangle]
pub extern "C" fn uthread_sleep(num_quantums: c_int) -> c_int {
    status(ops::sleep(num_quantums))
}

#[no_mangle]
pub extern "C" fn uthread_get_tid() -> c_int {
    saturate(ops::get_current_id() as u64)
}

#[no_mangle]
pub extern "C" fn uthread_get_total_quantums() -> c_int {
    saturate(ops::get_total_quantums())
}

#[no_mangle]
pub extern "C" fn uthread_get_quantums(tid: c_int) -> c_int {
    count(report(tid_from_c(tid)).and_then(ops::get_quantums))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_ids_are_invalid() {
        assert_eq!(tid_from_c(-1), Err(Error::InvalidId(-1)));
        assert_eq!(tid_from_c(c_int::MIN), Err(Error::InvalidId(c_int::MIN as i64)));
        assert_eq!(tid_from_c(7), Ok(7));
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(status(Ok(())), 0);
        assert_eq!(status(Err(Error::NullArgument)), FAILURE);
        assert_eq!(count(Ok(12)), 12);
        assert_eq!(count(Err(Error::NoSuchThread(3))), FAILURE);
        assert_eq!(saturate(u64::MAX), c_int::MAX);
    }
}
