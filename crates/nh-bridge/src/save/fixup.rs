//! Pre-save fixup guard.

use std::ops::{Deref, DerefMut};

use crate::engine::Engine;

/// Vision level that shuts vision down for the duration of a save.
const VISION_OFF: i32 = 2;

/// Puts the engine into its "saving" shape and takes it back out on drop,
/// whether the save succeeded or not.
pub struct PreSaveFixup<'a> {
    engine: &'a mut dyn Engine,
}

impl<'a> PreSaveFixup<'a> {
    pub fn apply(engine: &'a mut dyn Engine) -> Self {
        {
            let state = engine.state_mut();
            state.saving += 1;
            state.mon_notifications = false;
        }
        engine.u_restore_save_shadows();
        engine.done_object_cleanup();
        engine.vision_recalc(VISION_OFF);
        engine.change_luck_for_date(-1);
        Self { engine }
    }
}

impl<'a> Deref for PreSaveFixup<'a> {
    type Target = dyn Engine + 'a;

    fn deref(&self) -> &Self::Target {
        self.engine
    }
}

impl<'a> DerefMut for PreSaveFixup<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
    }
}

impl Drop for PreSaveFixup<'_> {
    fn drop(&mut self) {
        self.engine.change_luck_for_date(1);
        {
            let state = self.engine.state_mut();
            state.mon_notifications = true;
            state.saving = state.saving.saturating_sub(1);
        }
        self.engine.vision_recalc(0);
        log::trace!("post-save fixup done");
    }
}
