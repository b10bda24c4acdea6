use std::sync::Arc;

use crate::error::ScopeError;
use crate::{Client, Scope};

#[derive(Debug, Clone)]
pub struct StackLayer {
    pub client: Option<Arc<Client>>,
    pub scope: Arc<Scope>,
}

/// The scope stack of a hub.
///
/// `top` is the active layer, `layers` holds the ones it was pushed over.
/// The stack can never be empty: the base layer lives in `top` while no
/// scope is pushed, and pops stop there.
#[derive(Debug)]
pub struct Stack {
    top: StackLayer,
    layers: Vec<StackLayer>,
}

impl Stack {
    pub fn from_client_and_scope(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Stack {
        Stack {
            top: StackLayer { client, scope },
            layers: vec![],
        }
    }

    /// Pushes a copy of the top layer and returns the new depth.
    pub fn push(&mut self) -> usize {
        let layer = self.top.clone();
        self.layers.push(layer);
        self.depth()
    }

    pub fn pop(&mut self) -> Result<(), ScopeError> {
        match self.layers.pop() {
            Some(layer) => {
                self.top = layer;
                Ok(())
            }
            None => Err(ScopeError::PopBaseScope),
        }
    }

    /// Pops the layer a guard created at `depth`.
    ///
    /// Layers pushed after it and still alive are released too.  A guard
    /// whose layer is already gone changes nothing.
    pub fn pop_guarded(&mut self, depth: usize) -> Result<(), ScopeError> {
        let actual = self.depth();
        if depth == 0 || actual < depth {
            return Err(ScopeError::StaleGuard {
                expected: depth,
                actual,
            });
        }
        while self.depth() >= depth {
            self.pop()?;
        }
        if actual == depth {
            Ok(())
        } else {
            Err(ScopeError::OutOfOrderPop {
                expected: depth,
                actual,
            })
        }
    }

    #[inline(always)]
    pub fn top(&self) -> &StackLayer {
        &self.top
    }

    #[inline(always)]
    pub fn top_mut(&mut self) -> &mut StackLayer {
        &mut self.top
    }

    /// The number of pushed scopes on top of the base scope.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}
