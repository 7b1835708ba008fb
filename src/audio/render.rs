// Real-time side of the device output unit
//
// The renderer lives inside the audio callback. New frames arrive over a
// channel and are drained with `try_recv`, so the callback never waits on
// the thread that queues them. When the device runs at a different rate
// than the stream, samples are linearly interpolated.

use std::collections::VecDeque;
use std::sync::mpsc;
use tokio::sync::oneshot;

pub(crate) struct QueuedFrame {
    samples: Vec<f32>,
    /// Read position in source samples
    position: f64,
    done: Option<oneshot::Sender<()>>,
}

impl QueuedFrame {
    pub(crate) fn new(samples: Vec<f32>, done: oneshot::Sender<()>) -> Self {
        Self {
            samples,
            position: 0.0,
            done: Some(done),
        }
    }

    fn is_played(&self) -> bool {
        self.position >= self.samples.len() as f64
    }
}

pub(crate) struct Renderer {
    incoming: mpsc::Receiver<QueuedFrame>,
    queue: VecDeque<QueuedFrame>,
    channels: usize,
    /// Source samples consumed per device sample
    step: f64,
}

impl Renderer {
    pub(crate) fn new(
        incoming: mpsc::Receiver<QueuedFrame>,
        channels: u16,
        source_rate: u32,
        device_rate: u32,
    ) -> Self {
        Self {
            incoming,
            queue: VecDeque::new(),
            channels: usize::from(channels.max(1)),
            step: f64::from(source_rate) / f64::from(device_rate.max(1)),
        }
    }

    /// Fill one interleaved callback buffer, writing silence on underrun.
    ///
    /// Mono samples are duplicated to every channel.
    pub(crate) fn render(&mut self, data: &mut [f32]) {
        while let Ok(frame) = self.incoming.try_recv() {
            self.queue.push_back(frame);
        }

        for slot in data.chunks_mut(self.channels) {
            let sample = self.next_sample();
            slot.fill(sample);
        }

        // Frames whose last sample landed exactly at the buffer end
        while self.queue.front().is_some_and(QueuedFrame::is_played) {
            self.finish_front();
        }
    }

    fn next_sample(&mut self) -> f32 {
        loop {
            let Some(front) = self.queue.front_mut() else {
                return 0.0;
            };

            let index = front.position as usize;
            if let Some(&current) = front.samples.get(index) {
                let next = front.samples.get(index + 1).copied().unwrap_or(current);
                let fraction = (front.position - index as f64) as f32;
                front.position += self.step;
                return current + (next - current) * fraction;
            }

            self.finish_front();
        }
    }

    fn finish_front(&mut self) {
        if let Some(mut frame) = self.queue.pop_front() {
            if let Some(done) = frame.done.take() {
                let _ = done.send(());
            }
        }
    }
}
