use std::collections::HashSet;

/// Allocator of small identifiers, reused once released
///
/// Ids are handed out counting upwards, skipping those still alive, so a released id is only
/// reused after the counter wrapped around.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    live: HashSet<usize>,
    next: usize,
}

impl IdAllocator {
    pub(crate) fn allocate(&mut self) -> usize {
        assert!(self.live.len() < usize::MAX, "Out of ids");

        while !self.live.insert(self.next) {
            self.next = self.next.wrapping_add(1);
        }
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    pub(crate) fn release(&mut self, id: usize) -> bool {
        self.live.remove(&id)
    }

    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.live.len()
    }
}

/// Declares a process wide [`IdAllocator`] behind a mutex
macro_rules! id_allocator {
    ($vis:vis static $name:ident) => {
        $vis static $name: ::once_cell::sync::Lazy<::std::sync::Mutex<$crate::utils::ids::IdAllocator>> =
            ::once_cell::sync::Lazy::new(::std::default::Default::default);
    };
}

pub(crate) use id_allocator;

#[cfg(test)]
mod tests {
    use super::IdAllocator;

    #[test]
    fn released_ids_wait_for_wraparound() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert!(ids.release(0));
        assert!(!ids.release(0));
        assert_eq!(ids.allocate(), 2);
        assert_eq!(ids.live(), 2);
    }

    #[test]
    fn live_ids_are_skipped() {
        let mut ids = IdAllocator {
            next: usize::MAX,
            ..Default::default()
        };
        assert_eq!(ids.allocate(), usize::MAX);
        assert_eq!(ids.allocate(), 0);
        ids.release(usize::MAX);
        ids.next = usize::MAX - 1;
        assert_eq!(ids.allocate(), usize::MAX - 1);
        assert_eq!(ids.allocate(), usize::MAX);
        assert_eq!(ids.allocate(), 1);
    }
}
