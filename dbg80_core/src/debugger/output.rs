use enum_dispatch::enum_dispatch;

/// Line oriented sink for everything the debugger reports to the operator.
#[enum_dispatch]
pub trait Output {
    fn print_line(&mut self, line: &str);

    fn take_lines(&mut self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn print_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

#[derive(Debug, Default)]
pub struct BufferedOutput {
    lines: Vec<String>,
}

impl BufferedOutput {
    pub fn new() -> BufferedOutput {
        BufferedOutput::default()
    }
}

impl Output for BufferedOutput {
    fn print_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn take_lines(&mut self) -> Vec<String> {
        std::mem::replace(&mut self.lines, Vec::new())
    }
}

#[enum_dispatch(Output)]
#[derive(Debug)]
pub enum OutputSink {
    ConsoleOutput,
    BufferedOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_output_collects_lines() {
        let mut sink: OutputSink = BufferedOutput::new().into();
        sink.print_line("one");
        sink.print_line("two");
        assert_eq!(sink.take_lines(), vec!["one", "two"]);
        assert!(sink.take_lines().is_empty());

        let mut console: OutputSink = ConsoleOutput.into();
        assert!(console.take_lines().is_empty());
    }
}
