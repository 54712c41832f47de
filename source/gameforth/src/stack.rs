use core::fmt;

/// Which of the VM's two stacks an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Data,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Underflow(StackKind),
    Overflow(StackKind),
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Data => f.write_str("data stack"),
            StackKind::Return => f.write_str("return stack"),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Underflow(kind) => write!(f, "{kind} underflow"),
            StackError::Overflow(kind) => write!(f, "{kind} overflow"),
        }
    }
}

/// A bounded stack of cells.
///
/// Pushing past `capacity` and popping an empty stack are both reported as
/// errors; the stack is never silently truncated.
pub struct Stack<T: Copy> {
    items: Vec<T>,
    capacity: usize,
    kind: StackKind,
}

impl<T: Copy> Stack<T> {
    pub fn new(kind: StackKind, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            kind,
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), StackError> {
        if self.items.len() >= self.capacity {
            return Err(StackError::Overflow(self.kind));
        }
        self.items.push(item);
        Ok(())
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn try_pop(&mut self) -> Result<T, StackError> {
        self.pop().ok_or(StackError::Underflow(self.kind))
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Pops the top `n` items, returning them in push order.
    ///
    /// Nothing is popped if fewer than `n` items are available.
    pub fn try_pop_n(&mut self, n: usize) -> Result<Vec<T>, StackError> {
        let depth = self.items.len();
        if n > depth {
            return Err(StackError::Underflow(self.kind));
        }
        Ok(self.items.split_off(depth - n))
    }

    #[inline]
    pub fn try_peek(&self) -> Result<T, StackError> {
        self.peek().ok_or(StackError::Underflow(self.kind))
    }

    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.items.last().copied()
    }

    #[inline]
    pub fn peek_back_n(&self, n: usize) -> Option<T> {
        let idx = self.items.len().checked_sub(n + 1)?;
        self.items.get(idx).copied()
    }

    #[inline]
    pub fn try_peek_back_n(&self, n: usize) -> Result<T, StackError> {
        self.peek_back_n(n).ok_or(StackError::Underflow(self.kind))
    }

    #[inline]
    pub fn overwrite_back_n(&mut self, n: usize, item: T) -> Result<(), StackError> {
        let idx = self
            .items
            .len()
            .checked_sub(n + 1)
            .ok_or(StackError::Underflow(self.kind))?;
        self.items[idx] = item;
        Ok(())
    }

    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The stack contents, bottom first.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
pub mod test {
    use super::{Stack, StackError, StackKind};

    #[test]
    fn stack() {
        const ITEMS: usize = 16;
        let mut stack = Stack::<i32>::new(StackKind::Data, ITEMS);

        for _ in 0..3 {
            for i in 0..(ITEMS as i32) {
                assert!(stack.push(i).is_ok());
            }
            assert_eq!(
                stack.push(100),
                Err(StackError::Overflow(StackKind::Data))
            );
            for i in (0..(ITEMS as i32)).rev() {
                assert_eq!(stack.pop().unwrap(), i);
            }
            assert!(stack.pop().is_none());
        }
    }

    #[test]
    fn peek_and_overwrite() {
        let mut stack = Stack::<i32>::new(StackKind::Return, 4);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();

        assert_eq!(stack.try_peek(), Ok(3));
        assert_eq!(stack.peek_back_n(2), Some(1));
        assert_eq!(
            stack.try_peek_back_n(3),
            Err(StackError::Underflow(StackKind::Return))
        );

        stack.overwrite_back_n(1, 20).unwrap();
        assert_eq!(stack.as_slice(), &[1, 20, 3]);
    }

    #[test]
    fn pop_n_is_all_or_nothing() {
        let mut stack = Stack::<i32>::new(StackKind::Data, 8);
        stack.push(10).unwrap();
        stack.push(20).unwrap();

        assert_eq!(
            stack.try_pop_n(3),
            Err(StackError::Underflow(StackKind::Data))
        );
        assert_eq!(stack.depth(), 2);

        stack.push(30).unwrap();
        assert_eq!(stack.try_pop_n(2).unwrap(), vec![20, 30]);
        assert_eq!(stack.as_slice(), &[10]);
        assert_eq!(stack.try_pop_n(0).unwrap(), Vec::<i32>::new());
    }
}
