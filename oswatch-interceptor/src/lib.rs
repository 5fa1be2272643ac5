//! LD_PRELOAD shim loaded into the traced child. Overrides the four
//! canonical heap primitives and reports each allocation/free event to
//! the supervisor over the pipe named by `OSWATCH_NOTIFY_FD`.
//!
//! This library owns no state the supervisor can see directly; it
//! communicates only by writing newline-terminated ASCII lines.

use libc::{c_void, size_t};
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Once;

const NOTIFY_FD_VAR: &str = "OSWATCH_NOTIFY_FD";
const BOOTSTRAP_POOL_SIZE: usize = 64 * 1024;

type MallocFn = unsafe extern "C" fn(size_t) -> *mut c_void;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type CallocFn = unsafe extern "C" fn(size_t, size_t) -> *mut c_void;
type ReallocFn = unsafe extern "C" fn(*mut c_void, size_t) -> *mut c_void;

static INIT: Once = Once::new();
static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);
static REAL_MALLOC: AtomicUsize = AtomicUsize::new(0);
static REAL_FREE: AtomicUsize = AtomicUsize::new(0);
static REAL_CALLOC: AtomicUsize = AtomicUsize::new(0);
static REAL_REALLOC: AtomicUsize = AtomicUsize::new(0);

static mut BOOTSTRAP_POOL: [u8; BOOTSTRAP_POOL_SIZE] = [0; BOOTSTRAP_POOL_SIZE];
static BOOTSTRAP_OFFSET: AtomicUsize = AtomicUsize::new(0);

// Bump allocator used for allocations that arrive before `dlsym` has
// resolved the real malloc. Never frees; the pool lives for the
// lifetime of the process.
unsafe fn bootstrap_malloc(size: usize) -> *mut c_void {
    let aligned = (size + 15) & !15;
    let prev = BOOTSTRAP_OFFSET.fetch_add(aligned, Ordering::SeqCst);
    if prev + aligned > BOOTSTRAP_POOL_SIZE {
        return std::ptr::null_mut();
    }
    BOOTSTRAP_POOL.as_mut_ptr().add(prev) as *mut c_void
}

unsafe fn is_bootstrap_ptr(ptr: *mut c_void) -> bool {
    let base = BOOTSTRAP_POOL.as_ptr() as usize;
    let p = ptr as usize;
    p >= base && p < base + BOOTSTRAP_POOL_SIZE
}

unsafe fn resolve(name: &str) -> usize {
    let c_name = CString::new(name).unwrap();
    let sym = libc::dlsym(libc::RTLD_NEXT, c_name.as_ptr() as *const c_char);
    sym as usize
}

fn init_interceptor() {
    INIT.call_once(|| unsafe {
        REAL_MALLOC.store(resolve("malloc"), Ordering::SeqCst);
        REAL_FREE.store(resolve("free"), Ordering::SeqCst);
        REAL_CALLOC.store(resolve("calloc"), Ordering::SeqCst);
        REAL_REALLOC.store(resolve("realloc"), Ordering::SeqCst);

        if let Ok(fd_str) = std::env::var(NOTIFY_FD_VAR) {
            if let Ok(fd) = fd_str.parse::<i32>() {
                NOTIFY_FD.store(fd, Ordering::SeqCst);
            }
        }
    });
}

fn notify(msg: &str) {
    let fd = NOTIFY_FD.load(Ordering::SeqCst);
    if fd < 0 {
        return;
    }
    unsafe {
        libc::write(fd, msg.as_ptr() as *const c_void, msg.len());
    }
}

#[no_mangle]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    init_interceptor();

    let real = REAL_MALLOC.load(Ordering::SeqCst);
    if real == 0 {
        return bootstrap_malloc(size);
    }
    let real_malloc: MallocFn = std::mem::transmute(real);
    let ptr = real_malloc(size);

    if !ptr.is_null() {
        notify(&format!("ALLOC {:p} {}\n", ptr, size));
    }
    ptr
}

#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    init_interceptor();

    if ptr.is_null() {
        return;
    }
    if is_bootstrap_ptr(ptr) {
        return;
    }

    notify(&format!("FREE {:p}\n", ptr));

    let real = REAL_FREE.load(Ordering::SeqCst);
    if real != 0 {
        let real_free: FreeFn = std::mem::transmute(real);
        real_free(ptr);
    }
}

#[no_mangle]
pub unsafe extern "C" fn calloc(nmemb: size_t, size: size_t) -> *mut c_void {
    init_interceptor();

    let real = REAL_CALLOC.load(Ordering::SeqCst);
    if real == 0 {
        let total = nmemb.saturating_mul(size);
        let ptr = bootstrap_malloc(total);
        if !ptr.is_null() {
            std::ptr::write_bytes(ptr as *mut u8, 0, total);
        }
        return ptr;
    }
    let real_calloc: CallocFn = std::mem::transmute(real);
    let ptr = real_calloc(nmemb, size);

    if !ptr.is_null() {
        notify(&format!("ALLOC {:p} {}\n", ptr, nmemb.saturating_mul(size)));
    }
    ptr
}

#[no_mangle]
pub unsafe extern "C" fn realloc(old_ptr: *mut c_void, size: size_t) -> *mut c_void {
    init_interceptor();

    let real = REAL_REALLOC.load(Ordering::SeqCst);
    if real == 0 {
        return bootstrap_malloc(size);
    }
    let real_realloc: ReallocFn = std::mem::transmute(real);
    let new_ptr = real_realloc(old_ptr, size);

    if !old_ptr.is_null() && !is_bootstrap_ptr(old_ptr) {
        notify(&format!("FREE {:p}\n", old_ptr));
    }
    if !new_ptr.is_null() {
        notify(&format!("ALLOC {:p} {}\n", new_ptr, size));
    }
    new_ptr
}
