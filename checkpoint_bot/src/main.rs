use arch_bot_commons::*;

fn main() {
    start_everything("WARN,checkpoint_bot=debug", checkpoint_bot::entry());
}
