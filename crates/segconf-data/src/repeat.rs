//! Endless iteration over a finite data loader.

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderIterator},
    prelude::*,
};

use crate::error::{DatasetError, DatasetResult};

/// Restarts the wrapped loader every time it runs out of batches.
///
/// Training is driven by an iteration count rather than epochs, so the
/// consumer simply keeps pulling batches. burn's loaders end a pass at the
/// first item the dataset fails to return; such a pass yields
/// [`DatasetError::IncompletePass`] instead of silently restarting.
pub struct RepeatingLoader<B: Backend, O> {
    loader: Arc<dyn DataLoader<B, O>>,
}

impl<B: Backend, O> RepeatingLoader<B, O> {
    /// Fails when the loader has no items, which would never yield a batch.
    pub fn new(loader: Arc<dyn DataLoader<B, O>>) -> DatasetResult<Self> {
        if loader.num_items() == 0 {
            return Err(DatasetError::EmptyLoader);
        }
        Ok(Self { loader })
    }

    pub fn iter(&self) -> RepeatingIter<'_, B, O> {
        RepeatingIter {
            loader: self.loader.as_ref(),
            current: self.loader.iter(),
            epoch: 0,
        }
    }
}

pub struct RepeatingIter<'a, B: Backend, O> {
    loader: &'a dyn DataLoader<B, O>,
    current: Box<dyn DataLoaderIterator<O> + 'a>,
    epoch: usize,
}

impl<B: Backend, O> RepeatingIter<'_, B, O> {
    /// Completed passes over the loader.
    pub const fn epoch(&self) -> usize {
        self.epoch
    }
}

impl<B: Backend, O> RepeatingIter<'_, B, O> {
    fn check_pass(&self) -> DatasetResult<()> {
        let progress = self.current.progress();
        if progress.items_processed < progress.items_total {
            return Err(DatasetError::IncompletePass {
                loaded: progress.items_processed,
                total: progress.items_total,
            });
        }
        Ok(())
    }
}

impl<B: Backend, O> Iterator for RepeatingIter<'_, B, O> {
    type Item = DatasetResult<O>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(batch) = self.current.next() {
            return Some(Ok(batch));
        }
        if let Err(e) = self.check_pass() {
            return Some(Err(e));
        }

        self.epoch += 1;
        tracing::debug!(epoch = self.epoch, "restarting data loader");
        self.current = self.loader.iter();

        match self.current.next() {
            Some(batch) => Some(Ok(batch)),
            None => Some(self.check_pass().and(Err(DatasetError::EmptyLoader))),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::data::{
        dataloader::{batcher::Batcher, DataLoaderBuilder},
        dataset::{Dataset, InMemDataset},
    };

    use super::*;
    use crate::tests::TestBackend;

    #[derive(Clone, Default)]
    struct CollectBatcher;

    impl<B: Backend> Batcher<B, u32, Vec<u32>> for CollectBatcher {
        fn batch(&self, items: Vec<u32>, _device: &B::Device) -> Vec<u32> {
            items
        }
    }

    fn loader(items: Vec<u32>) -> Arc<dyn DataLoader<TestBackend, Vec<u32>>> {
        DataLoaderBuilder::<TestBackend, _, _>::new(CollectBatcher)
            .batch_size(2)
            .build(InMemDataset::new(items))
    }

    #[test]
    fn repeating_loader_restarts_when_exhausted() {
        let repeating = RepeatingLoader::new(loader(vec![1, 2, 3])).unwrap();
        let mut iter = repeating.iter();

        let batches = iter
            .by_ref()
            .take(5)
            .collect::<DatasetResult<Vec<_>>>()
            .unwrap();

        assert_eq!(
            batches,
            vec![vec![1, 2], vec![3], vec![1, 2], vec![3], vec![1, 2]]
        );
        assert_eq!(iter.epoch(), 2);
    }

    /// Fails to return the item at `broken`, as a dataset does on a bad file.
    struct BrokenDataset {
        items: Vec<u32>,
        broken: usize,
    }

    impl Dataset<u32> for BrokenDataset {
        fn get(&self, index: usize) -> Option<u32> {
            if index == self.broken {
                return None;
            }
            self.items.get(index).copied()
        }

        fn len(&self) -> usize {
            self.items.len()
        }
    }

    #[test]
    fn repeating_loader_fails_on_short_pass() {
        let loader = DataLoaderBuilder::<TestBackend, _, _>::new(CollectBatcher)
            .batch_size(1)
            .build(BrokenDataset {
                items: vec![1, 2, 3],
                broken: 1,
            });
        let repeating = RepeatingLoader::new(loader).unwrap();
        let mut iter = repeating.iter();

        assert_eq!(iter.next().unwrap().unwrap(), vec![1]);
        assert!(matches!(
            iter.next(),
            Some(Err(DatasetError::IncompletePass { loaded: 1, total: 3 }))
        ));
        assert_eq!(iter.epoch(), 0);
    }

    #[test]
    fn repeating_loader_rejects_empty_loader() {
        let result = RepeatingLoader::new(loader(Vec::new()));

        assert!(matches!(result, Err(DatasetError::EmptyLoader)));
    }
}
