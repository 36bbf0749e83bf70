// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use duochat::Core::region::RegionMapping;
    use duochat::Core::SharedMemory::unlink_shared_memory;
    use duochat::Core::{attach_shared_memory, create_shared_memory, open_shared_memory, RawHandle};
    use duochat::Ring::Buffer::layout::{Direction, REGION_SIZE};
    use duochat::Ring::Structs::ChatMessage;

    fn unique_name(tag: &str) -> String {
        format!("/duochat_test_{}_{}_{}", tag, std::process::id(), fastrand::u32(..))
    }

    #[test]
    fn test_create_and_attach() {
        let name = unique_name("attach");
        let creator = create_shared_memory(&name, 4096).unwrap();
        assert!(creator.created());
        assert_eq!(creator.size(), 4096);
        assert_eq!(creator.name(), name);

        unsafe { *creator.as_ptr().add(10) = 0x42 };

        let attached = attach_shared_memory(&name, 4096).unwrap();
        assert!(!attached.created());
        assert_eq!(unsafe { *attached.as_ptr().add(10) }, 0x42);

        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_create_is_exclusive_and_open_falls_back() {
        let name = unique_name("excl");
        let _first = create_shared_memory(&name, 1024).unwrap();
        let err = create_shared_memory(&name, 1024).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);

        let second = open_shared_memory(&name, 1024).unwrap();
        assert!(!second.created());

        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_attach_rejects_size_mismatch() {
        let name = unique_name("size");
        let _shm = create_shared_memory(&name, 4096).unwrap();
        let err = attach_shared_memory(&name, 8192).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_attach_missing_segment() {
        let err = attach_shared_memory(&unique_name("missing"), 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        let err = unlink_shared_memory(&unique_name("missing")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_raw_handle() {
        let name = unique_name("handle");
        let shm = create_shared_memory(&name, 4096).unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd >= 0),
        }
        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_second_opener_keeps_heads() {
        let name = unique_name("region");
        let first = RegionMapping::open(&name).unwrap();
        assert!(first.is_creator());
        assert_eq!(first.shm().size(), REGION_SIZE);

        first.ring(Direction::AtoB).publish(&ChatMessage::new(1, "kept"));
        first.ring(Direction::AtoB).publish(&ChatMessage::new(2, "kept too"));

        let second = RegionMapping::open(&name).unwrap();
        assert!(!second.is_creator());
        assert_eq!(second.head(Direction::AtoB), 2);
        assert_eq!(second.head(Direction::BtoA), 0);
        assert_eq!(second.ring(Direction::AtoB).read(1).text(), "kept too");

        drop(first);
        assert_eq!(second.head(Direction::AtoB), 2);
        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_region_rejects_foreign_segment() {
        let name = unique_name("foreign");
        let _other = create_shared_memory(&name, 4096).unwrap();
        let err = RegionMapping::open(&name).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("Failed to open shared region"));
        unlink_shared_memory(&name).unwrap();
    }

    /// Create a segment the way a creator does, but stop before sizing it.
    fn create_unsized(name: &str) -> i32 {
        let c_name = std::ffi::CString::new(name).unwrap();
        let fd = unsafe {
            libc::shm_open(c_name.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, 0o600)
        };
        assert!(fd >= 0);
        fd
    }

    #[test]
    fn test_attach_waits_for_creator_to_size_segment() {
        let name = unique_name("unsized");
        let fd = create_unsized(&name);

        let sizer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(unsafe { libc::ftruncate(fd, REGION_SIZE as libc::off_t) }, 0);
            unsafe { libc::close(fd) };
        });

        let attached = open_shared_memory(&name, REGION_SIZE).unwrap();
        assert!(!attached.created());
        assert_eq!(attached.size(), REGION_SIZE);

        sizer.join().unwrap();
        unlink_shared_memory(&name).unwrap();
    }

    #[test]
    fn test_attach_gives_up_on_segment_never_sized() {
        let name = unique_name("never");
        let fd = create_unsized(&name);

        let err = attach_shared_memory(&name, 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        unsafe { libc::close(fd) };
        unlink_shared_memory(&name).unwrap();
    }
}
