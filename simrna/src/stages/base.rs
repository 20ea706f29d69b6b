/**
 * file: base.rs
 * desc: Base stage trait which every pipeline stage implements.
 */
use crate::fragment::Fragment;
use crate::genome::Transcript;

pub trait FragmentStage {
    // Human readable name and configuration summary
    fn name(&self) -> String;
    // Map a single record onto zero or more new records. The input is never modified and an
    // empty result means the record was rejected entirely
    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment>;
    // Diagnostics collected over the run so far
    fn status(&self) -> String;
}

impl<T: ?Sized> FragmentStage for Box<T>
where
    T: FragmentStage,
{
    fn name(&self) -> String {
        (**self).name()
    }

    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment> {
        (**self).process(fragment, transcript)
    }

    fn status(&self) -> String {
        (**self).status()
    }
}
